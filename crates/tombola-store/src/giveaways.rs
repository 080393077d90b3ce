//! Giveaway records and status transitions.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::database::Store;
use crate::error::{Result, StoreError};
use crate::models::{ArchivedGiveaway, Giveaway, GiveawayStatus, PrizeKind, UserId};

/// Fields supplied by the creator.  The store fills in identity, status and
/// bookkeeping.
#[derive(Debug, Clone)]
pub struct NewGiveaway {
    /// Explicit id, or `None` to have one generated.
    pub id: Option<String>,
    pub event_name: String,
    pub prize_kind: PrizeKind,
    pub prize_details: String,
    pub winner_count: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_by: UserId,
}

impl Store {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Validate and insert a new giveaway with status ACTIVE and zero
    /// participants.  Saves immediately.
    pub async fn create_giveaway(&self, new: NewGiveaway) -> Result<Giveaway> {
        if new.event_name.trim().is_empty() {
            return Err(StoreError::Validation {
                field: "event_name",
                message: "must not be empty".to_string(),
            });
        }
        if new.prize_details.trim().is_empty() {
            return Err(StoreError::Validation {
                field: "prize_details",
                message: "must not be empty".to_string(),
            });
        }
        if new.winner_count == 0 {
            return Err(StoreError::Validation {
                field: "winner_count",
                message: "must be positive".to_string(),
            });
        }
        if new.end_time <= new.start_time {
            return Err(StoreError::Validation {
                field: "end_time",
                message: "must be strictly after the start time".to_string(),
            });
        }

        let now = Utc::now();
        let id = new
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| generate_giveaway_id(now));

        let mut inner = self.lock().await;
        // Ids are never reused, archived ones included.
        if inner.doc.giveaways.contains_key(&id) || inner.doc.archived_giveaways.contains_key(&id)
        {
            return Err(StoreError::Validation {
                field: "id",
                message: format!("giveaway {id} already exists"),
            });
        }

        let giveaway = Giveaway {
            id: id.clone(),
            event_name: new.event_name,
            prize_kind: new.prize_kind,
            prize_details: new.prize_details,
            winner_count: new.winner_count,
            start_time: new.start_time,
            end_time: new.end_time,
            status: GiveawayStatus::Active,
            created_at: now,
            created_by: new.created_by,
            participants_count: 0,
            winners_selected: false,
            ended_at: None,
        };

        inner.doc.giveaways.insert(id.clone(), giveaway.clone());
        inner.doc.participants.entry(id.clone()).or_default();

        let month = now.format("%Y-%m").to_string();
        *inner.doc.giveaway_counters.entry(month).or_insert(0) += 1;

        self.persist(&mut inner)?;
        info!(giveaway = %id, "created giveaway");
        Ok(giveaway)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Snapshot of a single giveaway.
    pub async fn giveaway(&self, id: &str) -> Option<Giveaway> {
        self.lock().await.doc.giveaways.get(id).cloned()
    }

    /// Look a giveaway up by its event name (case-insensitive).
    pub async fn giveaway_by_name(&self, event_name: &str) -> Option<Giveaway> {
        self.lock()
            .await
            .doc
            .giveaways
            .values()
            .find(|g| g.event_name.eq_ignore_ascii_case(event_name))
            .cloned()
    }

    /// Giveaways that are ACTIVE and whose end time is still in the future.
    pub async fn active_giveaways(&self) -> Vec<Giveaway> {
        let now = Utc::now();
        self.lock()
            .await
            .doc
            .giveaways
            .values()
            .filter(|g| g.status == GiveawayStatus::Active && !g.has_expired(now))
            .cloned()
            .collect()
    }

    /// ACTIVE giveaways whose end time has passed: the set the scheduler's
    /// reconciliation sweep must end.
    pub async fn expired_giveaways(&self) -> Vec<Giveaway> {
        let now = Utc::now();
        self.lock()
            .await
            .doc
            .giveaways
            .values()
            .filter(|g| g.status == GiveawayStatus::Active && g.has_expired(now))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Status transitions
    // ------------------------------------------------------------------

    /// Flip ACTIVE → ENDED and stamp the end instant.  Returns false when
    /// the giveaway is unknown or already terminal, making the transition
    /// idempotent for racing callers.  Saves immediately.
    pub async fn mark_ended(&self, id: &str) -> Result<bool> {
        let mut inner = self.lock().await;
        let Some(giveaway) = inner.doc.giveaways.get_mut(id) else {
            return Ok(false);
        };
        if giveaway.status != GiveawayStatus::Active {
            return Ok(false);
        }
        giveaway.status = GiveawayStatus::Ended;
        giveaway.ended_at = Some(Utc::now());
        self.persist(&mut inner)?;
        info!(giveaway = %id, "marked ended");
        Ok(true)
    }

    /// Flip ACTIVE → CANCELLED.  Returns false when the giveaway is
    /// unknown or already terminal.
    pub async fn cancel_giveaway(&self, id: &str) -> Result<bool> {
        let mut inner = self.lock().await;
        let Some(giveaway) = inner.doc.giveaways.get_mut(id) else {
            return Ok(false);
        };
        if giveaway.status != GiveawayStatus::Active {
            return Ok(false);
        }
        giveaway.status = GiveawayStatus::Cancelled;
        giveaway.ended_at = Some(Utc::now());
        self.persist(&mut inner)?;
        info!(giveaway = %id, "cancelled");
        Ok(true)
    }

    /// Archive and remove a giveaway record.  Participant and winner
    /// records stay behind for auditing.
    pub async fn delete_giveaway(&self, id: &str, deleted_by: UserId) -> Result<bool> {
        let mut inner = self.lock().await;
        let Some(giveaway) = inner.doc.giveaways.remove(id) else {
            return Ok(false);
        };
        inner.doc.archived_giveaways.insert(
            id.to_string(),
            ArchivedGiveaway {
                giveaway,
                deleted_at: Utc::now(),
                deleted_by,
            },
        );
        self.persist(&mut inner)?;
        info!(giveaway = %id, "archived");
        Ok(true)
    }
}

/// Time-prefixed id with a random suffix, unique even for giveaways
/// created within the same second.
fn generate_giveaway_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("GIV_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}
