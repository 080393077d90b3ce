//! Winner records.
//!
//! Winners are only ever created for users holding an active participant
//! record, whether drawn by the scheduler or added by an admin override,
//! and a user can win a given giveaway at most once.

use chrono::Utc;
use tracing::info;

use crate::database::Store;
use crate::error::Result;
use crate::models::{UserId, Winner};
use crate::stats::{self, StatKind};

/// Outcome of [`Store::add_winner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerOutcome {
    Added,
    /// The user already won this giveaway.
    AlreadyWinner,
    /// The user holds no active participant record.
    NotParticipant,
}

impl Store {
    /// Append a winner record and flag the giveaway as drawn.  Deferred
    /// save.
    pub async fn add_winner(
        &self,
        giveaway_id: &str,
        user_id: UserId,
        prize_note: Option<String>,
    ) -> Result<WinnerOutcome> {
        let now = Utc::now();
        let mut inner = self.lock().await;

        let is_participant = inner
            .doc
            .participants
            .get(giveaway_id)
            .and_then(|roster| roster.get(&user_id))
            .is_some_and(|p| p.is_active);
        if !is_participant {
            return Ok(WinnerOutcome::NotParticipant);
        }

        let list = inner.doc.winners.entry(giveaway_id.to_string()).or_default();
        if list.iter().any(|w| w.user_id == user_id) {
            return Ok(WinnerOutcome::AlreadyWinner);
        }
        list.push(Winner {
            user_id,
            won_at: now,
            prize_claimed: false,
            claimed_at: None,
            prize_note,
        });

        if let Some(giveaway) = inner.doc.giveaways.get_mut(giveaway_id) {
            giveaway.winners_selected = true;
        }
        stats::record(&mut inner.doc, user_id, StatKind::Win, now);

        self.persist_batched(&mut inner)?;
        info!(giveaway = %giveaway_id, user = user_id, "winner recorded");
        Ok(WinnerOutcome::Added)
    }

    /// Winners of a giveaway, in draw order.
    pub async fn winners(&self, giveaway_id: &str) -> Vec<Winner> {
        self.lock()
            .await
            .doc
            .winners
            .get(giveaway_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Flag a winner's prize as claimed.  Returns false when the user is
    /// not a winner of this giveaway.  Saves immediately.
    pub async fn mark_prize_claimed(&self, giveaway_id: &str, user_id: UserId) -> Result<bool> {
        let mut inner = self.lock().await;
        let Some(winner) = inner
            .doc
            .winners
            .get_mut(giveaway_id)
            .and_then(|list| list.iter_mut().find(|w| w.user_id == user_id))
        else {
            return Ok(false);
        };
        winner.prize_claimed = true;
        winner.claimed_at = Some(Utc::now());
        self.persist(&mut inner)?;
        Ok(true)
    }
}
