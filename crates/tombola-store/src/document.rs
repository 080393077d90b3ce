//! The persisted document: every keyed collection in one JSON file.
//!
//! Missing top-level keys deserialize to their defaults, so a document
//! written by an older build loads cleanly.  A version-gated migration step
//! handles anything `#[serde(default)]` cannot express.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    ArchivedGiveaway, BanRecord, BroadcastChat, Cooldown, Giveaway, LogEntry, Participant,
    UserId, UserStats, Winner,
};

/// Bump this and extend [`migrate`] whenever the document layout changes.
pub(crate) const SCHEMA_VERSION: u32 = 2;

/// Upper bound on retained audit log entries.
pub(crate) const MAX_LOG_ENTRIES: usize = 5000;

/// Store-wide settings sub-document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub schema_version: u32,
    pub last_cleanup: DateTime<Utc>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_cleanup: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Document {
    #[serde(default)]
    pub giveaways: BTreeMap<String, Giveaway>,
    #[serde(default)]
    pub archived_giveaways: BTreeMap<String, ArchivedGiveaway>,
    /// Active participants, keyed by giveaway id then user id.
    #[serde(default)]
    pub participants: BTreeMap<String, BTreeMap<UserId, Participant>>,
    /// Soft-deleted participants, same keying.
    #[serde(default)]
    pub removed_participants: BTreeMap<String, BTreeMap<UserId, Participant>>,
    #[serde(default)]
    pub winners: BTreeMap<String, Vec<Winner>>,
    #[serde(default)]
    pub banned_users: Vec<BanRecord>,
    #[serde(default)]
    pub broadcast_chats: Vec<BroadcastChat>,
    /// Keyed by `"{user_id}:{action}"`.
    #[serde(default)]
    pub user_cooldowns: BTreeMap<String, Cooldown>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Giveaways created per `YYYY-MM` month.
    #[serde(default)]
    pub giveaway_counters: BTreeMap<String, u32>,
    #[serde(default)]
    pub user_stats: BTreeMap<UserId, UserStats>,
    #[serde(default)]
    pub settings: StoreSettings,
}

/// Bring a freshly loaded document up to [`SCHEMA_VERSION`].  Returns true
/// when anything changed and the document should be saved back.
pub(crate) fn migrate(doc: &mut Document) -> bool {
    let mut changed = false;

    if doc.settings.schema_version < SCHEMA_VERSION {
        tracing::info!(
            from = doc.settings.schema_version,
            to = SCHEMA_VERSION,
            "migrating store document"
        );
        doc.settings.schema_version = SCHEMA_VERSION;
        changed = true;
    }

    // Every giveaway owns a participant roster, even an empty one.
    let missing: Vec<String> = doc
        .giveaways
        .keys()
        .filter(|id| !doc.participants.contains_key(*id))
        .cloned()
        .collect();
    for id in missing {
        doc.participants.insert(id, BTreeMap::new());
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GiveawayStatus, PrizeKind};

    fn sample_giveaway(id: &str) -> Giveaway {
        let now = Utc::now();
        Giveaway {
            id: id.to_string(),
            event_name: "Sample".to_string(),
            prize_kind: PrizeKind::Currency,
            prize_details: "1000 coins".to_string(),
            winner_count: 1,
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            status: GiveawayStatus::Active,
            created_at: now,
            created_by: 1,
            participants_count: 0,
            winners_selected: false,
            ended_at: None,
        }
    }

    #[test]
    fn migrate_backfills_participant_rosters() {
        let mut doc = Document::default();
        doc.giveaways
            .insert("GIV_1".to_string(), sample_giveaway("GIV_1"));

        assert!(migrate(&mut doc));
        assert!(doc.participants.contains_key("GIV_1"));
        // Second run is a no-op.
        assert!(!migrate(&mut doc));
    }

    #[test]
    fn missing_collections_deserialize_to_defaults() {
        let doc: Document = serde_json::from_str(r#"{"giveaways": {}}"#).unwrap();
        assert!(doc.logs.is_empty());
        assert_eq!(doc.settings.schema_version, SCHEMA_VERSION);
    }
}
