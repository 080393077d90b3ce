//! Uniform winner sampling.

use rand::seq::SliceRandom;
use rand::Rng;

use tombola_store::UserId;

/// Draw up to `count` distinct winners uniformly at random, without
/// replacement.  When the pool is no larger than `count` every participant
/// wins and the order is unspecified.  The returned order is the draw
/// order, used only for place labels in announcements.
pub fn select_winners(pool: &[UserId], count: usize) -> Vec<UserId> {
    select_winners_with(&mut rand::thread_rng(), pool, count)
}

/// Same as [`select_winners`] with an injectable RNG for deterministic
/// tests.
pub fn select_winners_with<R: Rng + ?Sized>(
    rng: &mut R,
    pool: &[UserId],
    count: usize,
) -> Vec<UserId> {
    if pool.is_empty() || count == 0 {
        return Vec::new();
    }
    if pool.len() <= count {
        return pool.to_vec();
    }
    pool.choose_multiple(rng, count).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn never_returns_more_than_requested() {
        let pool: Vec<UserId> = (1..=10).collect();
        let winners = select_winners(&pool, 3);
        assert_eq!(winners.len(), 3);
    }

    #[test]
    fn small_pool_is_a_full_clear() {
        let pool = vec![1, 2];
        let winners = select_winners(&pool, 5);
        assert_eq!(winners.len(), 2);
        assert_eq!(
            winners.iter().collect::<HashSet<_>>(),
            pool.iter().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn empty_inputs_yield_no_winners() {
        assert!(select_winners(&[], 3).is_empty());
        assert!(select_winners(&[1, 2, 3], 0).is_empty());
    }

    #[test]
    fn winners_are_distinct_and_drawn_from_the_pool() {
        let pool: Vec<UserId> = (1..=100).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let winners = select_winners_with(&mut rng, &pool, 25);

        let unique: HashSet<_> = winners.iter().collect();
        assert_eq!(unique.len(), winners.len());
        assert!(winners.iter().all(|w| pool.contains(w)));
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let pool: Vec<UserId> = (1..=50).collect();
        let a = select_winners_with(&mut StdRng::seed_from_u64(42), &pool, 5);
        let b = select_winners_with(&mut StdRng::seed_from_u64(42), &pool, 5);
        assert_eq!(a, b);
    }
}
