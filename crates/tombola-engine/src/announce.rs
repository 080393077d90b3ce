//! Announcement and notification text.
//!
//! Plain text only; any platform-specific markup is the adapter's problem.

use chrono::FixedOffset;

use tombola_store::{Giveaway, Participant};

use crate::clock;

fn prize_line(giveaway: &Giveaway) -> String {
    format!(
        "{} - {}",
        giveaway.prize_kind.label(),
        giveaway.prize_details
    )
}

/// Broadcast text for a newly created giveaway.
pub fn created(giveaway: &Giveaway, offset: FixedOffset) -> String {
    format!(
        "Giveaway started: {name}\n\
         Prize: {prize}\n\
         Winners: {winners}\n\
         Starts: {start}\n\
         Ends: {end} (runs {duration})\n\n\
         Join with the giveaway id {id}",
        name = giveaway.event_name,
        prize = prize_line(giveaway),
        winners = giveaway.winner_count,
        start = clock::format_wall_clock(giveaway.start_time, offset),
        end = clock::format_wall_clock(giveaway.end_time, offset),
        duration = clock::humanize_between(giveaway.start_time, giveaway.end_time),
        id = giveaway.id,
    )
}

/// Broadcast text for a giveaway that ended with winners, listed in draw
/// order with place labels.
pub fn ended_with_winners(giveaway: &Giveaway, winners: &[Participant]) -> String {
    let mut text = format!(
        "Giveaway ended: {name}\nPrize: {prize}\n\nWinners:\n",
        name = giveaway.event_name,
        prize = prize_line(giveaway),
    );
    for (index, winner) in winners.iter().enumerate() {
        text.push_str(&format!(
            "{place}: {who}\n",
            place = ordinal(index + 1),
            who = winner.display_name(),
        ));
    }
    text.push_str("\nWinners will be contacted directly to claim their prizes.");
    text
}

/// Broadcast text for a giveaway that ended with nobody in it.
pub fn ended_without_participants(giveaway: &Giveaway) -> String {
    format!(
        "Giveaway ended: {name}\nPrize: {prize}\n\nNo participants joined this giveaway.",
        name = giveaway.event_name,
        prize = prize_line(giveaway),
    )
}

/// Direct message sent to each winner.
pub fn winner_direct_message(giveaway: &Giveaway) -> String {
    format!(
        "Congratulations, you won!\n\n\
         Event: {name}\n\
         Prize: {prize}\n\
         Giveaway id: {id}\n\n\
         Contact the organizer to claim your prize.",
        name = giveaway.event_name,
        prize = prize_line(giveaway),
        id = giveaway.id,
    )
}

/// Delivery summary sent to the owner after winner notifications.
pub fn delivery_report(
    giveaway: &Giveaway,
    winners: &[Participant],
    notified: usize,
    failed: usize,
) -> String {
    let names: Vec<String> = winners.iter().map(|w| w.display_name()).collect();
    format!(
        "Winner notification report for {name} ({id})\n\
         Winners: {total}\n\
         Notified: {notified}\n\
         Failed: {failed}\n\
         {list}",
        name = giveaway.event_name,
        id = giveaway.id,
        total = winners.len(),
        list = names.join(", "),
    )
}

/// Short note to the owner when a giveaway ends empty.
pub fn empty_giveaway_notice(giveaway: &Giveaway) -> String {
    format!(
        "Giveaway {id} ended with no participants.",
        id = giveaway.id
    )
}

/// Boot notice for the owner.
pub fn startup_notice(active: usize) -> String {
    format!("Giveaway engine started with {active} active giveaways.")
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tombola_store::{GiveawayStatus, PrizeKind};

    fn sample_giveaway() -> Giveaway {
        let now = Utc::now();
        Giveaway {
            id: "GIV_20260301_120000_abcd1234".to_string(),
            event_name: "Spring Drop".to_string(),
            prize_kind: PrizeKind::ItemCollection,
            prize_details: "legendary set".to_string(),
            winner_count: 3,
            start_time: now,
            end_time: now + Duration::hours(2),
            status: GiveawayStatus::Active,
            created_at: now,
            created_by: 1,
            participants_count: 0,
            winners_selected: false,
            ended_at: None,
        }
    }

    fn participant(user_id: i64, username: &str) -> Participant {
        Participant {
            user_id,
            username: Some(username.to_string()),
            first_name: None,
            last_name: None,
            joined_at: Utc::now(),
            is_active: true,
            removed_at: None,
            removed_by: None,
        }
    }

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
    }

    #[test]
    fn winner_announcement_lists_draw_order() {
        let giveaway = sample_giveaway();
        let winners = vec![participant(1, "alice"), participant(2, "bob")];
        let text = ended_with_winners(&giveaway, &winners);

        assert!(text.contains("1st: @alice"));
        assert!(text.contains("2nd: @bob"));
        assert!(text.contains("Spring Drop"));
        assert!(text.contains("Item Collection - legendary set"));
    }

    #[test]
    fn empty_giveaway_announcement_says_so() {
        let text = ended_without_participants(&sample_giveaway());
        assert!(text.contains("No participants joined"));
    }
}
