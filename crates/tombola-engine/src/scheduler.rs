//! Time-driven giveaway lifecycle.
//!
//! One long-lived [`GiveawayScheduler`] owns a timer task per active
//! giveaway and a periodic reconciliation sweep over expired-but-ACTIVE
//! giveaways.  The store's status field is the single source of truth: the
//! timer table is rebuilt from it on startup and the end transition
//! re-checks it before doing anything, so a timer and the sweep racing to
//! end the same giveaway is harmless — end-of-giveaway delivery is
//! at-least-once with idempotent effect.
//!
//! Timer tasks carry nothing but a giveaway id; every decision is made
//! against freshly fetched store state.  The store lock is never held
//! across a sink call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tombola_store::{ChatId, Giveaway, LogKind, Participant, Store, UserId, WinnerOutcome};

use crate::announce;
use crate::clock;
use crate::error::EngineError;
use crate::selector::select_winners;
use crate::traits::{NotificationSink, NotifyTarget};

/// Tuning knobs for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Period of the reconciliation sweep.
    pub sweep_interval: Duration,
    /// Pause between individual winner notifications, to stay under
    /// platform rate limits.
    pub notify_pacing: Duration,
    /// Chat that receives delivery reports and startup notices.
    pub owner_chat: Option<ChatId>,
    /// Offset used when rendering times in announcements.
    pub display_offset: FixedOffset,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            notify_pacing: Duration::from_millis(500),
            owner_chat: None,
            display_offset: clock::default_display_offset(),
        }
    }
}

/// Result of one end-of-giveaway transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    /// The giveaway was ended by this call.
    Ended {
        participants: usize,
        winners: Vec<UserId>,
    },
    /// Another caller already completed the transition; nothing was done.
    AlreadyEnded,
    /// No giveaway with this id exists.
    NotFound,
}

struct Inner {
    store: Store,
    sink: Arc<dyn NotificationSink>,
    opts: SchedulerOptions,
    /// Pending end timers by giveaway id.  Process-local and rebuildable;
    /// never authoritative.
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// Cheap-to-clone handle; all clones drive the same timer table.
#[derive(Clone)]
pub struct GiveawayScheduler {
    inner: Arc<Inner>,
}

impl GiveawayScheduler {
    pub fn new(store: Store, sink: Arc<dyn NotificationSink>, opts: SchedulerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                sink,
                opts,
                timers: Mutex::new(HashMap::new()),
                sweeper: Mutex::new(None),
            }),
        }
    }

    fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Startup recovery: end anything already past due, register a timer
    /// for every remaining active giveaway, then start the reconciliation
    /// sweep.
    pub async fn start(&self) -> Result<(), EngineError> {
        for giveaway in self.store().expired_giveaways().await {
            warn!(giveaway = %giveaway.id, "past end time at startup, ending now");
            if let Err(e) = self.end_giveaway(&giveaway.id).await {
                error!(giveaway = %giveaway.id, error = %e, "startup end failed; sweep will retry");
            }
        }

        let active = self.store().active_giveaways().await;
        let recovered = active.len();
        for giveaway in active {
            self.schedule_end(&giveaway.id, giveaway.end_time).await;
        }

        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.inner.opts.sweep_interval);
            // The first tick fires immediately; recovery already covered it.
            interval.tick().await;
            loop {
                interval.tick().await;
                scheduler.sweep().await;
            }
        });
        *self.inner.sweeper.lock().await = Some(handle);

        info!(active = recovered, "scheduler started");
        Ok(())
    }

    /// Register (or replace) the end timer for a giveaway.
    pub async fn schedule_end(&self, giveaway_id: &str, end_time: DateTime<Utc>) {
        let delay = (end_time - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(giveaway = %giveaway_id, in_secs = delay.as_secs(), "end timer registered");

        let scheduler = self.clone();
        let id = giveaway_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = scheduler.end_giveaway(&id).await {
                error!(giveaway = %id, error = %e, "end timer failed; sweep will retry");
            }
        });

        if let Some(old) = self
            .inner
            .timers
            .lock()
            .await
            .insert(giveaway_id.to_string(), handle)
        {
            old.abort();
        }
    }

    /// Drop a pending timer without touching the store.  Used for
    /// administrative deletion; the record is handled separately.
    pub async fn remove(&self, giveaway_id: &str) {
        if let Some(handle) = self.inner.timers.lock().await.remove(giveaway_id) {
            handle.abort();
            info!(giveaway = %giveaway_id, "timer dropped");
        }
    }

    /// The end-of-giveaway transition.  Safe to invoke more than once for
    /// the same id: the persisted status flip decides a single winner
    /// among racing callers.
    pub async fn end_giveaway(&self, giveaway_id: &str) -> Result<EndOutcome, EngineError> {
        let Some(giveaway) = self.store().giveaway(giveaway_id).await else {
            warn!(giveaway = %giveaway_id, "cannot end unknown giveaway");
            return Ok(EndOutcome::NotFound);
        };

        // The status flip is persisted before winners are drawn, so a
        // concurrent join sees NotActive and a concurrent end call no-ops
        // right here.
        if !self.store().mark_ended(giveaway_id).await? {
            debug!(giveaway = %giveaway_id, "already ended");
            return Ok(EndOutcome::AlreadyEnded);
        }

        if let Some(handle) = self.inner.timers.lock().await.remove(giveaway_id) {
            handle.abort();
        }

        let participants = self.store().active_participants(giveaway_id).await;
        let pool: Vec<UserId> = participants.iter().map(|p| p.user_id).collect();
        let winner_ids = select_winners(&pool, giveaway.winner_count as usize);

        for user_id in &winner_ids {
            match self.store().add_winner(giveaway_id, *user_id, None).await? {
                WinnerOutcome::Added => {}
                outcome => {
                    warn!(giveaway = %giveaway_id, user = user_id, ?outcome, "winner not recorded")
                }
            }
        }

        // Winner snapshots in draw order, for place labels.
        let winners: Vec<Participant> = winner_ids
            .iter()
            .filter_map(|id| participants.iter().find(|p| p.user_id == *id).cloned())
            .collect();

        self.broadcast_result(&giveaway, &winners).await;
        self.notify_winners(&giveaway, &winners).await;

        self.store()
            .append_log(
                LogKind::GiveawayEnded,
                0,
                Some(giveaway_id.to_string()),
                format!(
                    "ended with {} winners out of {} participants",
                    winners.len(),
                    participants.len()
                ),
            )
            .await?;

        info!(
            giveaway = %giveaway_id,
            participants = participants.len(),
            winners = winners.len(),
            "giveaway ended"
        );
        Ok(EndOutcome::Ended {
            participants: participants.len(),
            winners: winner_ids,
        })
    }

    /// Announce a freshly created giveaway to every broadcast chat.
    pub async fn announce_created(&self, giveaway: &Giveaway) {
        let text = announce::created(giveaway, self.inner.opts.display_offset);
        let sent = self.broadcast(&text).await;
        info!(giveaway = %giveaway.id, sent, "creation announced");
    }

    /// Best-effort boot notice to the owner chat.
    pub async fn send_startup_notice(&self) {
        let Some(owner) = self.inner.opts.owner_chat else {
            return;
        };
        let active = self.store().active_giveaways().await.len();
        let text = announce::startup_notice(active);
        if let Err(e) = self.inner.sink.send(NotifyTarget::Chat(owner), &text).await {
            warn!(error = %e, "startup notice delivery failed");
        }
    }

    /// Stop the sweep and all timers, then flush pending saves.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        if let Some(handle) = self.inner.sweeper.lock().await.take() {
            handle.abort();
        }
        for (_, handle) in self.inner.timers.lock().await.drain() {
            handle.abort();
        }
        self.store().flush().await?;
        info!("scheduler stopped");
        Ok(())
    }

    /// Reconciliation sweep: the safety net against missed timers, clock
    /// drift and process restarts.
    async fn sweep(&self) {
        for giveaway in self.store().expired_giveaways().await {
            info!(giveaway = %giveaway.id, "sweep found expired giveaway");
            if let Err(e) = self.end_giveaway(&giveaway.id).await {
                error!(giveaway = %giveaway.id, error = %e, "sweep end failed, will retry next cycle");
            }
        }
    }

    /// Send `text` to every registered broadcast chat.  Per-target
    /// failures are logged and do not abort the rest.
    async fn broadcast(&self, text: &str) -> usize {
        let mut sent = 0;
        for chat in self.store().broadcast_chats().await {
            match self
                .inner
                .sink
                .send(NotifyTarget::Chat(chat.chat_id), text)
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => warn!(chat = chat.chat_id, error = %e, "broadcast delivery failed"),
            }
        }
        sent
    }

    async fn broadcast_result(&self, giveaway: &Giveaway, winners: &[Participant]) {
        let text = if winners.is_empty() {
            announce::ended_without_participants(giveaway)
        } else {
            announce::ended_with_winners(giveaway, winners)
        };
        let sent = self.broadcast(&text).await;
        info!(giveaway = %giveaway.id, sent, "result announced");
    }

    async fn notify_winners(&self, giveaway: &Giveaway, winners: &[Participant]) {
        if winners.is_empty() {
            if let Some(owner) = self.inner.opts.owner_chat {
                let note = announce::empty_giveaway_notice(giveaway);
                if let Err(e) = self.inner.sink.send(NotifyTarget::Chat(owner), &note).await {
                    warn!(error = %e, "owner notice delivery failed");
                }
            }
            return;
        }

        let text = announce::winner_direct_message(giveaway);
        let mut notified = 0;
        let mut failed = 0;
        for winner in winners {
            match self
                .inner
                .sink
                .send(NotifyTarget::User(winner.user_id), &text)
                .await
            {
                Ok(()) => notified += 1,
                Err(e) => {
                    warn!(user = winner.user_id, error = %e, "winner notification failed");
                    failed += 1;
                }
            }
            tokio::time::sleep(self.inner.opts.notify_pacing).await;
        }

        if let Some(owner) = self.inner.opts.owner_chat {
            let report = announce::delivery_report(giveaway, winners, notified, failed);
            if let Err(e) = self.inner.sink.send(NotifyTarget::Chat(owner), &report).await {
                warn!(error = %e, "delivery report failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NotifyError;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;
    use tombola_store::{GiveawayStatus, NewGiveaway, PrizeKind, ProfileSnapshot};

    /// Sink that records every delivery.
    #[derive(Default)]
    struct RecordingSink {
        sent: std::sync::Mutex<Vec<(NotifyTarget, String)>>,
        fail_users: HashSet<UserId>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<(NotifyTarget, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn chats(&self) -> usize {
            self.sent()
                .iter()
                .filter(|(t, _)| matches!(t, NotifyTarget::Chat(_)))
                .count()
        }

        fn users(&self) -> Vec<UserId> {
            self.sent()
                .iter()
                .filter_map(|(t, _)| match t {
                    NotifyTarget::User(u) => Some(*u),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, target: NotifyTarget, text: &str) -> Result<(), NotifyError> {
            if let NotifyTarget::User(user) = target {
                if self.fail_users.contains(&user) {
                    return Err(NotifyError("simulated outage".to_string()));
                }
            }
            self.sent.lock().unwrap().push((target, text.to_string()));
            Ok(())
        }
    }

    fn fast_opts() -> SchedulerOptions {
        SchedulerOptions {
            sweep_interval: Duration::from_secs(3600),
            notify_pacing: Duration::from_millis(1),
            owner_chat: None,
            display_offset: clock::default_display_offset(),
        }
    }

    async fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("store.json")).unwrap();
        (dir, store)
    }

    async fn create_giveaway(store: &Store, winner_count: u32, runs_for_ms: i64) -> String {
        let now = Utc::now();
        store
            .create_giveaway(NewGiveaway {
                id: None,
                event_name: "Timer Test".to_string(),
                prize_kind: PrizeKind::Currency,
                prize_details: "100 coins".to_string(),
                winner_count,
                start_time: now,
                end_time: now + ChronoDuration::milliseconds(runs_for_ms),
                created_by: 1,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn timer_ends_giveaway_and_draws_one_winner() {
        let (_dir, store) = open_store().await;
        store.add_broadcast_chat(-100, None, None).await.unwrap();

        let id = create_giveaway(&store, 1, 400).await;
        for user in [100, 101, 102] {
            store
                .add_participant(&id, user, ProfileSnapshot::default())
                .await
                .unwrap();
        }

        let sink = Arc::new(RecordingSink::default());
        let scheduler = GiveawayScheduler::new(store.clone(), sink.clone(), fast_opts());
        scheduler
            .schedule_end(&id, Utc::now() + ChronoDuration::milliseconds(200))
            .await;

        tokio::time::sleep(Duration::from_millis(700)).await;

        let giveaway = store.giveaway(&id).await.unwrap();
        assert_eq!(giveaway.status, GiveawayStatus::Ended);

        let winners = store.winners(&id).await;
        assert_eq!(winners.len(), 1);
        assert!([100, 101, 102].contains(&winners[0].user_id));

        // Exactly one announcement batch: one broadcast chat, one winner DM.
        assert_eq!(sink.chats(), 1);
        assert_eq!(sink.users().len(), 1);
    }

    #[tokio::test]
    async fn small_pools_win_in_full() {
        let (_dir, store) = open_store().await;
        let id = create_giveaway(&store, 5, 3_600_000).await;
        for user in [100, 101] {
            store
                .add_participant(&id, user, ProfileSnapshot::default())
                .await
                .unwrap();
        }

        let sink = Arc::new(RecordingSink::default());
        let scheduler = GiveawayScheduler::new(store.clone(), sink, fast_opts());
        let outcome = scheduler.end_giveaway(&id).await.unwrap();

        assert!(matches!(outcome, EndOutcome::Ended { participants: 2, .. }));
        let winners = store.winners(&id).await;
        assert_eq!(winners.len(), 2);
        let ids: HashSet<UserId> = winners.iter().map(|w| w.user_id).collect();
        assert_eq!(ids, HashSet::from([100, 101]));
    }

    #[tokio::test]
    async fn ending_twice_is_a_no_op() {
        let (_dir, store) = open_store().await;
        store.add_broadcast_chat(-100, None, None).await.unwrap();

        let id = create_giveaway(&store, 1, 3_600_000).await;
        store
            .add_participant(&id, 100, ProfileSnapshot::default())
            .await
            .unwrap();

        let sink = Arc::new(RecordingSink::default());
        let scheduler = GiveawayScheduler::new(store.clone(), sink.clone(), fast_opts());

        let first = scheduler.end_giveaway(&id).await.unwrap();
        assert!(matches!(first, EndOutcome::Ended { .. }));
        let sent_after_first = sink.sent().len();

        let second = scheduler.end_giveaway(&id).await.unwrap();
        assert_eq!(second, EndOutcome::AlreadyEnded);

        assert_eq!(store.winners(&id).await.len(), 1);
        assert_eq!(sink.sent().len(), sent_after_first);
    }

    #[tokio::test]
    async fn ending_with_no_participants_still_announces() {
        let (_dir, store) = open_store().await;
        store.add_broadcast_chat(-100, None, None).await.unwrap();

        let id = create_giveaway(&store, 3, 3_600_000).await;
        let sink = Arc::new(RecordingSink::default());
        let scheduler = GiveawayScheduler::new(store.clone(), sink.clone(), fast_opts());

        let outcome = scheduler.end_giveaway(&id).await.unwrap();
        assert!(matches!(
            outcome,
            EndOutcome::Ended { participants: 0, ref winners } if winners.is_empty()
        ));

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("No participants"));
    }

    #[tokio::test]
    async fn startup_recovery_ends_overdue_giveaways_without_the_sweep() {
        let (_dir, store) = open_store().await;

        // Created, then the process "died" past the end time: discard the
        // scheduler, keep the store.
        let id = create_giveaway(&store, 1, 100).await;
        store
            .add_participant(&id, 100, ProfileSnapshot::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let sink = Arc::new(RecordingSink::default());
        let scheduler = GiveawayScheduler::new(store.clone(), sink, fast_opts());
        // Sweep interval is one hour, so only startup recovery can end it.
        scheduler.start().await.unwrap();

        let giveaway = store.giveaway(&id).await.unwrap();
        assert_eq!(giveaway.status, GiveawayStatus::Ended);
        assert_eq!(store.winners(&id).await.len(), 1);

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failed_winner_notification_does_not_abort_the_batch() {
        let (_dir, store) = open_store().await;
        let id = create_giveaway(&store, 2, 3_600_000).await;
        for user in [100, 101] {
            store
                .add_participant(&id, user, ProfileSnapshot::default())
                .await
                .unwrap();
        }

        let sink = Arc::new(RecordingSink {
            fail_users: HashSet::from([100]),
            ..Default::default()
        });
        let scheduler = GiveawayScheduler::new(store.clone(), sink.clone(), fast_opts());
        scheduler.end_giveaway(&id).await.unwrap();

        // Both are winners; the failing recipient did not stop the other.
        assert_eq!(store.winners(&id).await.len(), 2);
        assert_eq!(sink.users(), vec![101]);
    }

    #[tokio::test]
    async fn removing_a_timer_leaves_the_store_alone() {
        let (_dir, store) = open_store().await;
        let id = create_giveaway(&store, 1, 200).await;

        let sink = Arc::new(RecordingSink::default());
        let scheduler = GiveawayScheduler::new(store.clone(), sink, fast_opts());
        scheduler
            .schedule_end(&id, Utc::now() + ChronoDuration::milliseconds(200))
            .await;
        scheduler.remove(&id).await;

        tokio::time::sleep(Duration::from_millis(400)).await;
        // The timer was dropped, so the giveaway is still ACTIVE (the
        // sweep would eventually catch it in production).
        assert_eq!(
            store.giveaway(&id).await.unwrap().status,
            GiveawayStatus::Active
        );
    }
}
