//! Per-(user, action) cooldowns with lazy eviction.

use chrono::{Duration, Utc};

use crate::database::Store;
use crate::error::Result;
use crate::models::{Cooldown, UserId};

pub(crate) fn cooldown_key(user_id: UserId, action: &str) -> String {
    format!("{user_id}:{action}")
}

impl Store {
    /// Start (or restart) a cooldown.  Deferred save.
    pub async fn set_cooldown(
        &self,
        user_id: UserId,
        action: &str,
        duration: Duration,
    ) -> Result<()> {
        let now = Utc::now();
        let mut inner = self.lock().await;
        inner.doc.user_cooldowns.insert(
            cooldown_key(user_id, action),
            Cooldown {
                action: action.to_string(),
                set_at: now,
                expires_at: now + duration,
            },
        );
        self.persist_batched(&mut inner)
    }

    /// Whether the user may perform the action.  Returns false while the
    /// cooldown is running; an expired entry is evicted on the way out.
    pub async fn check_cooldown(&self, user_id: UserId, action: &str) -> Result<bool> {
        let now = Utc::now();
        let key = cooldown_key(user_id, action);
        let mut inner = self.lock().await;
        match inner.doc.user_cooldowns.get(&key) {
            None => Ok(true),
            Some(cd) if now < cd.expires_at => Ok(false),
            Some(_) => {
                inner.doc.user_cooldowns.remove(&key);
                self.persist_batched(&mut inner)?;
                Ok(true)
            }
        }
    }

    /// Whole seconds until the cooldown expires, or zero when none is
    /// running.
    pub async fn remaining_cooldown(&self, user_id: UserId, action: &str) -> i64 {
        let key = cooldown_key(user_id, action);
        self.lock()
            .await
            .doc
            .user_cooldowns
            .get(&key)
            .map(|cd| (cd.expires_at - Utc::now()).num_seconds().max(0))
            .unwrap_or(0)
    }

    /// Clear one action's cooldown, or every cooldown the user holds.
    pub async fn clear_cooldowns(&self, user_id: UserId, action: Option<&str>) -> Result<()> {
        let mut inner = self.lock().await;
        match action {
            Some(action) => {
                inner.doc.user_cooldowns.remove(&cooldown_key(user_id, action));
            }
            None => {
                let prefix = format!("{user_id}:");
                inner
                    .doc
                    .user_cooldowns
                    .retain(|key, _| !key.starts_with(&prefix));
            }
        }
        self.persist_batched(&mut inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("store.json")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn running_cooldown_blocks_until_expiry() {
        let (_dir, store) = open_store().await;

        store
            .set_cooldown(100, "participate", Duration::hours(1))
            .await
            .unwrap();
        assert!(!store.check_cooldown(100, "participate").await.unwrap());
        assert!(store.remaining_cooldown(100, "participate").await > 3500);

        // A different action is unaffected.
        assert!(store.check_cooldown(100, "claim").await.unwrap());
    }

    #[tokio::test]
    async fn expired_cooldown_is_evicted_on_check() {
        let (_dir, store) = open_store().await;

        store
            .set_cooldown(100, "participate", Duration::seconds(-1))
            .await
            .unwrap();
        assert!(store.check_cooldown(100, "participate").await.unwrap());
        assert_eq!(store.remaining_cooldown(100, "participate").await, 0);
    }

    #[tokio::test]
    async fn clearing_all_cooldowns_for_a_user() {
        let (_dir, store) = open_store().await;

        store.set_cooldown(100, "a", Duration::hours(1)).await.unwrap();
        store.set_cooldown(100, "b", Duration::hours(1)).await.unwrap();
        store.set_cooldown(200, "a", Duration::hours(1)).await.unwrap();

        store.clear_cooldowns(100, None).await.unwrap();
        assert!(store.check_cooldown(100, "a").await.unwrap());
        assert!(store.check_cooldown(100, "b").await.unwrap());
        assert!(!store.check_cooldown(200, "a").await.unwrap());
    }
}
