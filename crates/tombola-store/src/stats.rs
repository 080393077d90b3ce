//! Per-user counters and store-wide dashboard numbers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::Store;
use crate::document::Document;
use crate::error::Result;
use crate::models::{GiveawayStatus, UserId, UserStats};

/// Which counter a recorded event bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Participation,
    Win,
    Removal,
}

/// Bump a user's counter, creating the stats record on first sight.
pub(crate) fn record(doc: &mut Document, user_id: UserId, kind: StatKind, now: DateTime<Utc>) {
    let stats = doc.user_stats.entry(user_id).or_insert_with(|| UserStats {
        user_id,
        first_seen: now,
        last_seen: now,
        total_participations: 0,
        total_wins: 0,
        total_removals: 0,
    });
    stats.last_seen = now;
    match kind {
        StatKind::Participation => stats.total_participations += 1,
        StatKind::Win => stats.total_wins += 1,
        StatKind::Removal => stats.total_removals += 1,
    }
}

/// Store-wide counts for the operator dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_giveaways: usize,
    pub active_giveaways: usize,
    pub total_participants: usize,
    pub banned_users: usize,
    pub broadcast_chats: usize,
    pub total_logs: usize,
    pub tracked_users: usize,
    pub active_cooldowns: usize,
}

impl Store {
    /// Bump one of a user's counters.  Deferred save.
    pub async fn record_stat(&self, user_id: UserId, kind: StatKind) -> Result<()> {
        let mut inner = self.lock().await;
        record(&mut inner.doc, user_id, kind, Utc::now());
        self.persist_batched(&mut inner)
    }

    /// A user's counters, if the user has ever been seen.
    pub async fn user_stats(&self, user_id: UserId) -> Option<UserStats> {
        self.lock().await.doc.user_stats.get(&user_id).cloned()
    }

    /// Users ranked by participation count, descending.
    pub async fn top_participants(&self, limit: usize) -> Vec<UserStats> {
        let inner = self.lock().await;
        let mut users: Vec<UserStats> = inner.doc.user_stats.values().cloned().collect();
        users.sort_by(|a, b| b.total_participations.cmp(&a.total_participations));
        users.truncate(limit);
        users
    }

    /// Dashboard counts across all collections.
    pub async fn store_stats(&self) -> StoreStats {
        let now = Utc::now();
        let inner = self.lock().await;
        let doc = &inner.doc;
        StoreStats {
            total_giveaways: doc.giveaways.len(),
            active_giveaways: doc
                .giveaways
                .values()
                .filter(|g| g.status == GiveawayStatus::Active && !g.has_expired(now))
                .count(),
            total_participants: doc.participants.values().map(|r| r.len()).sum(),
            banned_users: doc.banned_users.iter().filter(|b| b.active).count(),
            broadcast_chats: doc.broadcast_chats.iter().filter(|c| c.active).count(),
            total_logs: doc.logs.len(),
            tracked_users: doc.user_stats.len(),
            active_cooldowns: doc.user_cooldowns.len(),
        }
    }
}
