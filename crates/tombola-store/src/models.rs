//! Domain model structs persisted in the giveaway document store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be written
//! to the backing document and handed to adapters as a snapshot.  Instants
//! are always UTC (RFC 3339 on disk).  Status-like fields are closed enums
//! that are validated at the store boundary: an unknown stored value fails
//! the load instead of propagating silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Numeric user identity on the chat platform.
pub type UserId = i64;

/// Numeric chat identity on the chat platform.
pub type ChatId = i64;

// ---------------------------------------------------------------------------
// Giveaway
// ---------------------------------------------------------------------------

/// Lifecycle state of a giveaway.  ACTIVE may move to ENDED (the normal
/// path, exactly once) or to CANCELLED; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GiveawayStatus {
    Active,
    Ended,
    Cancelled,
}

/// What kind of prize a giveaway pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeKind {
    Currency,
    ItemCollection,
}

impl PrizeKind {
    /// Human-readable label used in announcements.
    pub fn label(&self) -> &'static str {
        match self {
            PrizeKind::Currency => "Currency",
            PrizeKind::ItemCollection => "Item Collection",
        }
    }
}

/// A timed giveaway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Giveaway {
    /// Opaque unique identifier, never reused.
    pub id: String,
    /// Display name of the event.
    pub event_name: String,
    pub prize_kind: PrizeKind,
    /// Free-text description of the prize.
    pub prize_details: String,
    /// How many winners to draw at the end.
    pub winner_count: u32,
    pub start_time: DateTime<Utc>,
    /// Strictly after `start_time`.
    pub end_time: DateTime<Utc>,
    pub status: GiveawayStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    /// Cached count of active participants, kept in step by the store.
    pub participants_count: u64,
    /// Set once winners have been persisted for this giveaway.
    pub winners_selected: bool,
    /// Stamped when the status flips away from ACTIVE.
    pub ended_at: Option<DateTime<Utc>>,
}

impl Giveaway {
    /// Whether the nominal end time has passed, regardless of status.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }
}

/// A giveaway that was administratively deleted.  Records are archived
/// rather than destroyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedGiveaway {
    pub giveaway: Giveaway,
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: UserId,
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Profile fields captured at join time.  The snapshot is deliberate: later
/// profile changes on the platform do not rewrite history here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A user's entry in one giveaway.  Unique per (giveaway, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub joined_at: DateTime<Utc>,
    /// Cleared on admin removal; removed records move to the archive.
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_by: Option<UserId>,
}

impl Participant {
    /// Best display form: handle, then first name, then the bare id.
    pub fn display_name(&self) -> String {
        if let Some(username) = &self.username {
            format!("@{username}")
        } else if let Some(first) = &self.first_name {
            first.clone()
        } else {
            format!("user {}", self.user_id)
        }
    }
}

// ---------------------------------------------------------------------------
// Winner
// ---------------------------------------------------------------------------

/// A drawn (or administratively added) winner.  Unique per (giveaway, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub user_id: UserId,
    pub won_at: DateTime<Utc>,
    pub prize_claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Optional note attached by an admin when awarding manually.
    pub prize_note: Option<String>,
}

// ---------------------------------------------------------------------------
// Ban
// ---------------------------------------------------------------------------

/// One ban cycle for a user.  Unbanning deactivates the record, preserving
/// the history of repeat offenders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanRecord {
    pub user_id: UserId,
    pub banned_at: DateTime<Utc>,
    pub banned_by: Option<UserId>,
    pub reason: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbanned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbanned_by: Option<UserId>,
}

// ---------------------------------------------------------------------------
// Broadcast chat
// ---------------------------------------------------------------------------

/// A chat that receives giveaway announcements.  Keyed by the platform chat
/// id (handles can change); removal is a soft flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastChat {
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub title: Option<String>,
    pub added_at: DateTime<Utc>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Cooldown
// ---------------------------------------------------------------------------

/// A per-(user, action) hold with an expiry instant.  Expired entries are
/// evicted lazily on the next check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cooldown {
    pub action: String,
    pub set_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Category of an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    GiveawayCreated,
    GiveawayEnded,
    GiveawayCancelled,
    GiveawayDeleted,
    ParticipantRemoved,
    WinnerAdded,
    UserBanned,
    UserUnbanned,
    Cleanup,
    Backup,
    Restore,
}

/// Append-only audit record, bounded to the most recent entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub kind: LogKind,
    /// Acting user, or `0` for the system.
    pub actor: UserId,
    pub giveaway_id: Option<String>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// User statistics
// ---------------------------------------------------------------------------

/// Running per-user counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_participations: u64,
    pub total_wins: u64,
    pub total_removals: u64,
}
