//! Ban records.
//!
//! Bans are append-only cycles: banning adds an active record, unbanning
//! deactivates it.  A user's full history is preserved.

use chrono::Utc;

use crate::database::Store;
use crate::error::Result;
use crate::logs;
use crate::models::{BanRecord, LogKind, UserId};

impl Store {
    /// Ban a user.  Returns false when an active ban already exists.
    /// Saves immediately.
    pub async fn ban_user(
        &self,
        user_id: UserId,
        reason: impl Into<String>,
        banned_by: Option<UserId>,
    ) -> Result<bool> {
        let mut inner = self.lock().await;
        if inner
            .doc
            .banned_users
            .iter()
            .any(|b| b.user_id == user_id && b.active)
        {
            return Ok(false);
        }

        let reason = reason.into();
        inner.doc.banned_users.push(BanRecord {
            user_id,
            banned_at: Utc::now(),
            banned_by,
            reason: reason.clone(),
            active: true,
            unbanned_at: None,
            unbanned_by: None,
        });
        logs::append(
            &mut inner.doc,
            LogKind::UserBanned,
            banned_by.unwrap_or(0),
            None,
            format!("banned user {user_id}: {reason}"),
        );
        self.persist(&mut inner)?;
        Ok(true)
    }

    /// Deactivate the user's active ban.  Returns false when none exists.
    /// Saves immediately.
    pub async fn unban_user(&self, user_id: UserId, unbanned_by: Option<UserId>) -> Result<bool> {
        let mut inner = self.lock().await;
        let Some(ban) = inner
            .doc
            .banned_users
            .iter_mut()
            .find(|b| b.user_id == user_id && b.active)
        else {
            return Ok(false);
        };
        ban.active = false;
        ban.unbanned_at = Some(Utc::now());
        ban.unbanned_by = unbanned_by;

        logs::append(
            &mut inner.doc,
            LogKind::UserUnbanned,
            unbanned_by.unwrap_or(0),
            None,
            format!("unbanned user {user_id}"),
        );
        self.persist(&mut inner)?;
        Ok(true)
    }

    /// Whether the user currently has an active ban.
    pub async fn is_banned(&self, user_id: UserId) -> bool {
        self.lock()
            .await
            .doc
            .banned_users
            .iter()
            .any(|b| b.user_id == user_id && b.active)
    }

    /// The user's active ban record, if any.
    pub async fn ban_info(&self, user_id: UserId) -> Option<BanRecord> {
        self.lock()
            .await
            .doc
            .banned_users
            .iter()
            .find(|b| b.user_id == user_id && b.active)
            .cloned()
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
    async fn ban_unban_cycles_preserve_history() {
        let (_dir, store) = open_store().await;

        assert!(store.ban_user(100, "spam", Some(1)).await.unwrap());
        // Double-banning is refused, not an error.
        assert!(!store.ban_user(100, "spam again", Some(1)).await.unwrap());
        assert!(store.is_banned(100).await);

        assert!(store.unban_user(100, Some(1)).await.unwrap());
        assert!(!store.is_banned(100).await);
        assert!(!store.unban_user(100, Some(1)).await.unwrap());

        // Re-banning starts a second cycle; both records remain.
        assert!(store.ban_user(100, "again", Some(1)).await.unwrap());
        assert!(store.is_banned(100).await);
        assert_eq!(
            store.ban_info(100).await.map(|b| b.reason),
            Some("again".to_string())
        );
    }
}
