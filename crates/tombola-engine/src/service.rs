//! The operations surface adapters call.
//!
//! Every lifecycle-affecting action routes through the one long-lived
//! scheduler injected at construction; handlers never build their own.

use chrono::{Duration, Utc};
use tracing::info;

use tombola_store::{
    Giveaway, JoinError, LogKind, NewGiveaway, ProfileSnapshot, Store, UserId, WinnerOutcome,
};

use crate::error::EngineError;
use crate::scheduler::{EndOutcome, GiveawayScheduler};
use crate::validate::{DenyReason, ValidationGate, Verdict};

/// Cooldown action applied after a successful join.
pub const ACTION_PARTICIPATE: &str = "participate";

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Upper bound on a giveaway's winner count.
    pub max_winners: u32,
    /// Cooldown between joins by the same user.
    pub join_cooldown: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_winners: 10,
            join_cooldown: Duration::minutes(5),
        }
    }
}

/// Facade over the store, gate and scheduler: create, join, end, cancel,
/// and the administrative overrides.
pub struct GiveawayService {
    store: Store,
    scheduler: GiveawayScheduler,
    gate: ValidationGate,
    opts: ServiceOptions,
}

impl GiveawayService {
    pub fn new(
        store: Store,
        scheduler: GiveawayScheduler,
        gate: ValidationGate,
        opts: ServiceOptions,
    ) -> Self {
        Self {
            store,
            scheduler,
            gate,
            opts,
        }
    }

    /// Create a giveaway, register its end timer, and announce it.
    pub async fn create(&self, new: NewGiveaway) -> Result<Giveaway, EngineError> {
        if new.winner_count > self.opts.max_winners {
            return Err(EngineError::Invalid {
                field: "winner_count",
                message: format!("must be at most {}", self.opts.max_winners),
            });
        }
        if new.end_time <= Utc::now() {
            return Err(EngineError::Invalid {
                field: "end_time",
                message: "must be in the future".to_string(),
            });
        }

        let giveaway = self.store.create_giveaway(new).await?;
        self.store
            .append_log(
                LogKind::GiveawayCreated,
                giveaway.created_by,
                Some(giveaway.id.clone()),
                format!("created \"{}\"", giveaway.event_name),
            )
            .await?;

        self.scheduler
            .schedule_end(&giveaway.id, giveaway.end_time)
            .await;
        self.scheduler.announce_created(&giveaway).await;

        Ok(giveaway)
    }

    /// Validate and join.  Denials are ordinary outcomes, not errors.
    pub async fn join(
        &self,
        user_id: UserId,
        profile: ProfileSnapshot,
        giveaway_id: &str,
    ) -> Result<Verdict, EngineError> {
        match self.gate.validate(user_id, giveaway_id).await? {
            Verdict::Denied(reason) => Ok(Verdict::Denied(reason)),
            Verdict::Allowed => {
                match self.store.add_participant(giveaway_id, user_id, profile).await {
                    Ok(_) => {
                        self.store
                            .set_cooldown(user_id, ACTION_PARTICIPATE, self.opts.join_cooldown)
                            .await?;
                        info!(giveaway = %giveaway_id, user = user_id, "join accepted");
                        Ok(Verdict::Allowed)
                    }
                    // The gate and the insert race against concurrent joins
                    // and the end transition; surface the store's verdict.
                    Err(JoinError::AlreadyJoined) => {
                        Ok(Verdict::Denied(DenyReason::AlreadyJoined))
                    }
                    Err(JoinError::NotFound) => Ok(Verdict::Denied(DenyReason::NotFound)),
                    Err(JoinError::NotActive) | Err(JoinError::Ended) => {
                        Ok(Verdict::Denied(DenyReason::NotActive))
                    }
                    Err(JoinError::Store(e)) => Err(e.into()),
                }
            }
        }
    }

    /// Force the end transition now, bypassing the timer.
    pub async fn end_now(&self, giveaway_id: &str) -> Result<EndOutcome, EngineError> {
        self.scheduler.end_giveaway(giveaway_id).await
    }

    /// Cancel an active giveaway and drop its timer.
    pub async fn cancel(&self, giveaway_id: &str, cancelled_by: UserId) -> Result<bool, EngineError> {
        let cancelled = self.store.cancel_giveaway(giveaway_id).await?;
        if cancelled {
            self.scheduler.remove(giveaway_id).await;
            self.store
                .append_log(
                    LogKind::GiveawayCancelled,
                    cancelled_by,
                    Some(giveaway_id.to_string()),
                    "cancelled",
                )
                .await?;
        }
        Ok(cancelled)
    }

    /// Archive a giveaway record and drop its timer.
    pub async fn delete(&self, giveaway_id: &str, deleted_by: UserId) -> Result<bool, EngineError> {
        self.scheduler.remove(giveaway_id).await;
        let deleted = self.store.delete_giveaway(giveaway_id, deleted_by).await?;
        if deleted {
            self.store
                .append_log(
                    LogKind::GiveawayDeleted,
                    deleted_by,
                    Some(giveaway_id.to_string()),
                    "archived",
                )
                .await?;
        }
        Ok(deleted)
    }

    /// Admin removal of a participant.
    pub async fn remove_participant(
        &self,
        giveaway_id: &str,
        user_id: UserId,
        removed_by: UserId,
    ) -> Result<bool, EngineError> {
        let removed = self
            .store
            .remove_participant(giveaway_id, user_id, removed_by)
            .await?;
        if removed {
            self.store
                .append_log(
                    LogKind::ParticipantRemoved,
                    removed_by,
                    Some(giveaway_id.to_string()),
                    format!("removed user {user_id}"),
                )
                .await?;
        }
        Ok(removed)
    }

    /// Administrative winner override.  The store refuses users without an
    /// active participant record, so membership is validated first.
    pub async fn add_manual_winner(
        &self,
        giveaway_id: &str,
        user_id: UserId,
        prize_note: Option<String>,
        added_by: UserId,
    ) -> Result<WinnerOutcome, EngineError> {
        let outcome = self.store.add_winner(giveaway_id, user_id, prize_note).await?;
        if outcome == WinnerOutcome::Added {
            self.store
                .append_log(
                    LogKind::WinnerAdded,
                    added_by,
                    Some(giveaway_id.to_string()),
                    format!("manually awarded user {user_id}"),
                )
                .await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerOptions;
    use crate::traits::{
        NotificationSink, NotifyError, NotifyTarget, SubscriptionOracle, SubscriptionReport,
    };
    use async_trait::async_trait;
    use std::sync::Arc;
    use tombola_store::{GiveawayStatus, PrizeKind};

    struct NullSink;

    #[async_trait]
    impl NotificationSink for NullSink {
        async fn send(&self, _target: NotifyTarget, _text: &str) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    struct OpenOracle;

    #[async_trait]
    impl SubscriptionOracle for OpenOracle {
        async fn check_all(&self, _user_id: UserId, _channels: &[String]) -> SubscriptionReport {
            SubscriptionReport::subscribed()
        }
    }

    async fn build_service() -> (tempfile::TempDir, Store, GiveawayService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("store.json")).unwrap();
        let scheduler = GiveawayScheduler::new(
            store.clone(),
            Arc::new(NullSink),
            SchedulerOptions {
                sweep_interval: std::time::Duration::from_secs(3600),
                notify_pacing: std::time::Duration::from_millis(1),
                ..Default::default()
            },
        );
        let gate = ValidationGate::new(store.clone(), Arc::new(OpenOracle), Vec::new());
        let service = GiveawayService::new(
            store.clone(),
            scheduler,
            gate,
            ServiceOptions::default(),
        );
        (dir, store, service)
    }

    fn new_giveaway(winner_count: u32) -> NewGiveaway {
        let now = Utc::now();
        NewGiveaway {
            id: None,
            event_name: "Service Test".to_string(),
            prize_kind: PrizeKind::Currency,
            prize_details: "200 coins".to_string(),
            winner_count,
            start_time: now,
            end_time: now + Duration::hours(1),
            created_by: 1,
        }
    }

    #[tokio::test]
    async fn create_enforces_the_winner_cap() {
        let (_dir, _store, service) = build_service().await;
        let err = service.create(new_giveaway(50)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Invalid { field: "winner_count", .. }
        ));
    }

    #[tokio::test]
    async fn join_sets_a_cooldown_and_blocks_the_next_attempt() {
        let (_dir, store, service) = build_service().await;
        let giveaway = service.create(new_giveaway(1)).await.unwrap();
        let second = service.create(new_giveaway(1)).await.unwrap();

        let verdict = service
            .join(100, ProfileSnapshot::default(), &giveaway.id)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Allowed);
        assert!(store.is_participant(&giveaway.id, 100).await);

        // The participate cooldown now blocks a join elsewhere.
        let verdict = service
            .join(100, ProfileSnapshot::default(), &second.id)
            .await
            .unwrap();
        assert!(matches!(
            verdict,
            Verdict::Denied(DenyReason::OnCooldown { .. })
        ));
    }

    #[tokio::test]
    async fn banned_users_are_turned_away_with_the_ban_code() {
        let (_dir, store, service) = build_service().await;
        let giveaway = service.create(new_giveaway(1)).await.unwrap();
        store.ban_user(100, "spam", Some(1)).await.unwrap();

        let verdict = service
            .join(100, ProfileSnapshot::default(), &giveaway.id)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Denied(DenyReason::Banned));
        assert!(!store.is_participant(&giveaway.id, 100).await);
    }

    #[tokio::test]
    async fn cancel_is_terminal() {
        let (_dir, store, service) = build_service().await;
        let giveaway = service.create(new_giveaway(1)).await.unwrap();

        assert!(service.cancel(&giveaway.id, 1).await.unwrap());
        assert!(!service.cancel(&giveaway.id, 1).await.unwrap());
        assert_eq!(
            store.giveaway(&giveaway.id).await.unwrap().status,
            GiveawayStatus::Cancelled
        );

        // A cancelled giveaway cannot be ended.
        let outcome = service.end_now(&giveaway.id).await.unwrap();
        assert_eq!(outcome, EndOutcome::AlreadyEnded);
    }

    #[tokio::test]
    async fn manual_winners_must_be_participants() {
        let (_dir, _store, service) = build_service().await;
        let giveaway = service.create(new_giveaway(1)).await.unwrap();

        let outcome = service
            .add_manual_winner(&giveaway.id, 999, None, 1)
            .await
            .unwrap();
        assert_eq!(outcome, WinnerOutcome::NotParticipant);

        service
            .join(999, ProfileSnapshot::default(), &giveaway.id)
            .await
            .unwrap();
        let outcome = service
            .add_manual_winner(&giveaway.id, 999, Some("consolation".to_string()), 1)
            .await
            .unwrap();
        assert_eq!(outcome, WinnerOutcome::Added);
    }
}
