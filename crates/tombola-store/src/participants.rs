//! Participant rosters, one per giveaway.
//!
//! A user holds at most one active participant record per giveaway.  Admin
//! removal archives the record instead of destroying it, and the cached
//! count on the parent giveaway is recomputed from the roster after every
//! mutation.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::database::Store;
use crate::error::StoreError;
use crate::models::{GiveawayStatus, Participant, ProfileSnapshot, UserId};
use crate::stats::{self, StatKind};

/// Why a join attempt was refused.  These are ordinary outcomes the
/// presentation layer renders, not failures.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("giveaway not found")]
    NotFound,

    #[error("giveaway is not active")]
    NotActive,

    /// End time has passed even though the status still says ACTIVE; the
    /// scheduler will end it shortly.
    #[error("giveaway has ended")]
    Ended,

    #[error("already joined this giveaway")]
    AlreadyJoined,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Store {
    /// Insert a participant record, update the cached count and the user's
    /// statistics.  Deferred save.
    pub async fn add_participant(
        &self,
        giveaway_id: &str,
        user_id: UserId,
        profile: ProfileSnapshot,
    ) -> Result<Participant, JoinError> {
        let now = Utc::now();
        let mut inner = self.lock().await;

        let Some(giveaway) = inner.doc.giveaways.get(giveaway_id) else {
            return Err(JoinError::NotFound);
        };
        if giveaway.status != GiveawayStatus::Active {
            return Err(JoinError::NotActive);
        }
        if giveaway.has_expired(now) {
            return Err(JoinError::Ended);
        }

        let roster = inner
            .doc
            .participants
            .entry(giveaway_id.to_string())
            .or_default();
        if roster.get(&user_id).is_some_and(|p| p.is_active) {
            return Err(JoinError::AlreadyJoined);
        }

        let participant = Participant {
            user_id,
            username: profile.username,
            first_name: profile.first_name,
            last_name: profile.last_name,
            joined_at: now,
            is_active: true,
            removed_at: None,
            removed_by: None,
        };
        roster.insert(user_id, participant.clone());
        let count = roster.values().filter(|p| p.is_active).count() as u64;

        if let Some(giveaway) = inner.doc.giveaways.get_mut(giveaway_id) {
            giveaway.participants_count = count;
        }
        stats::record(&mut inner.doc, user_id, StatKind::Participation, now);

        self.persist_batched(&mut inner)?;
        info!(giveaway = %giveaway_id, user = user_id, "participant joined");
        Ok(participant)
    }

    /// Soft-delete a participant: the record moves to the removed archive
    /// and the cached count is recomputed.  Returns false for a
    /// non-participant rather than failing.
    pub async fn remove_participant(
        &self,
        giveaway_id: &str,
        user_id: UserId,
        removed_by: UserId,
    ) -> crate::error::Result<bool> {
        let now = Utc::now();
        let mut inner = self.lock().await;

        let Some(roster) = inner.doc.participants.get_mut(giveaway_id) else {
            return Ok(false);
        };
        let Some(mut participant) = roster.remove(&user_id) else {
            return Ok(false);
        };
        participant.is_active = false;
        participant.removed_at = Some(now);
        participant.removed_by = Some(removed_by);
        let count = roster.values().filter(|p| p.is_active).count() as u64;

        inner
            .doc
            .removed_participants
            .entry(giveaway_id.to_string())
            .or_default()
            .insert(user_id, participant);

        if let Some(giveaway) = inner.doc.giveaways.get_mut(giveaway_id) {
            giveaway.participants_count = count;
        }
        stats::record(&mut inner.doc, user_id, StatKind::Removal, now);

        self.persist_batched(&mut inner)?;
        info!(giveaway = %giveaway_id, user = user_id, "participant removed");
        Ok(true)
    }

    /// Active participants of a giveaway.
    pub async fn active_participants(&self, giveaway_id: &str) -> Vec<Participant> {
        self.lock()
            .await
            .doc
            .participants
            .get(giveaway_id)
            .map(|roster| {
                roster
                    .values()
                    .filter(|p| p.is_active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the user currently holds an active record in the giveaway.
    pub async fn is_participant(&self, giveaway_id: &str, user_id: UserId) -> bool {
        self.lock()
            .await
            .doc
            .participants
            .get(giveaway_id)
            .and_then(|roster| roster.get(&user_id))
            .is_some_and(|p| p.is_active)
    }

    /// Ids of every giveaway the user actively participates in.
    pub async fn participations_of(&self, user_id: UserId) -> Vec<String> {
        self.lock()
            .await
            .doc
            .participants
            .iter()
            .filter(|(_, roster)| roster.get(&user_id).is_some_and(|p| p.is_active))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::giveaways::NewGiveaway;
    use crate::models::PrizeKind;
    use chrono::Duration;

    async fn store_with_giveaway() -> (tempfile::TempDir, Store, String) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("store.json")).unwrap();
        let now = Utc::now();
        let giveaway = store
            .create_giveaway(NewGiveaway {
                id: None,
                event_name: "Weekly Draw".to_string(),
                prize_kind: PrizeKind::ItemCollection,
                prize_details: "rare set".to_string(),
                winner_count: 3,
                start_time: now,
                end_time: now + Duration::hours(1),
                created_by: 1,
            })
            .await
            .unwrap();
        let id = giveaway.id;
        (dir, store, id)
    }

    fn profile(name: &str) -> ProfileSnapshot {
        ProfileSnapshot {
            username: Some(name.to_string()),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn joining_twice_is_refused_and_count_is_stable() {
        let (_dir, store, id) = store_with_giveaway().await;

        store.add_participant(&id, 100, profile("alice")).await.unwrap();
        let err = store
            .add_participant(&id, 100, profile("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, JoinError::AlreadyJoined));

        let giveaway = store.giveaway(&id).await.unwrap();
        assert_eq!(giveaway.participants_count, 1);
    }

    #[tokio::test]
    async fn joining_unknown_or_ended_giveaways_is_refused() {
        let (_dir, store, id) = store_with_giveaway().await;

        let err = store
            .add_participant("GIV_nope", 100, profile("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, JoinError::NotFound));

        store.mark_ended(&id).await.unwrap();
        let err = store
            .add_participant(&id, 100, profile("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, JoinError::NotActive));
    }

    #[tokio::test]
    async fn removal_archives_and_recounts() {
        let (_dir, store, id) = store_with_giveaway().await;

        store.add_participant(&id, 100, profile("alice")).await.unwrap();
        store.add_participant(&id, 101, profile("bob")).await.unwrap();

        assert!(store.remove_participant(&id, 100, 1).await.unwrap());
        // Removing again reports failure, not an error.
        assert!(!store.remove_participant(&id, 100, 1).await.unwrap());

        assert!(!store.is_participant(&id, 100).await);
        assert!(store.is_participant(&id, 101).await);
        assert_eq!(store.giveaway(&id).await.unwrap().participants_count, 1);
        assert_eq!(store.active_participants(&id).await.len(), 1);
    }

    #[tokio::test]
    async fn participations_track_active_records_only() {
        let (_dir, store, id) = store_with_giveaway().await;

        store.add_participant(&id, 100, profile("alice")).await.unwrap();
        assert_eq!(store.participations_of(100).await, vec![id.clone()]);

        store.remove_participant(&id, 100, 1).await.unwrap();
        assert!(store.participations_of(100).await.is_empty());
    }
}
