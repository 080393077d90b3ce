//! Participation validation gate.
//!
//! Checks run cheapest-first and short-circuit on the first failure; the
//! subscription oracle is the only external call and is consulted last, so
//! local refusals never generate oracle traffic.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use tombola_store::{GiveawayStatus, Store, UserId};

use crate::error::EngineError;
use crate::service::ACTION_PARTICIPATE;
use crate::traits::{ChannelRef, MissingChannel, SubscriptionOracle};

/// Why a join attempt was turned away.  Serialized with a stable `code`
/// tag the presentation layer can dispatch on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenyReason {
    Banned,
    NotFound,
    NotActive,
    AlreadyJoined,
    OnCooldown {
        remaining_secs: i64,
    },
    /// Carries the channels the user still has to join so the caller can
    /// render join prompts.
    SubscriptionRequired {
        missing: Vec<MissingChannel>,
    },
}

impl DenyReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::Banned => "banned",
            DenyReason::NotFound => "not_found",
            DenyReason::NotActive => "not_active",
            DenyReason::AlreadyJoined => "already_joined",
            DenyReason::OnCooldown { .. } => "on_cooldown",
            DenyReason::SubscriptionRequired { .. } => "subscription_required",
        }
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allowed,
    Denied(DenyReason),
}

/// Combines ban state, giveaway state, duplicate-entry and cooldown checks
/// with the subscription oracle into a single accept/reject decision.
pub struct ValidationGate {
    store: Store,
    oracle: Arc<dyn SubscriptionOracle>,
    required_channels: Vec<ChannelRef>,
}

impl ValidationGate {
    pub fn new(
        store: Store,
        oracle: Arc<dyn SubscriptionOracle>,
        required_channels: Vec<ChannelRef>,
    ) -> Self {
        Self {
            store,
            oracle,
            required_channels,
        }
    }

    /// Decide whether `user_id` may join `giveaway_id`.
    pub async fn validate(
        &self,
        user_id: UserId,
        giveaway_id: &str,
    ) -> Result<Verdict, EngineError> {
        if self.store.is_banned(user_id).await {
            return Ok(Verdict::Denied(DenyReason::Banned));
        }

        match self.store.giveaway(giveaway_id).await {
            None => return Ok(Verdict::Denied(DenyReason::NotFound)),
            Some(giveaway) => {
                if giveaway.status != GiveawayStatus::Active
                    || giveaway.has_expired(Utc::now())
                {
                    return Ok(Verdict::Denied(DenyReason::NotActive));
                }
            }
        }

        if self.store.is_participant(giveaway_id, user_id).await {
            return Ok(Verdict::Denied(DenyReason::AlreadyJoined));
        }

        if !self.store.check_cooldown(user_id, ACTION_PARTICIPATE).await? {
            let remaining_secs = self
                .store
                .remaining_cooldown(user_id, ACTION_PARTICIPATE)
                .await;
            return Ok(Verdict::Denied(DenyReason::OnCooldown { remaining_secs }));
        }

        if !self.required_channels.is_empty() {
            let report = self
                .oracle
                .check_all(user_id, &self.required_channels)
                .await;
            if !report.all_subscribed {
                return Ok(Verdict::Denied(DenyReason::SubscriptionRequired {
                    missing: report.missing,
                }));
            }
        }

        Ok(Verdict::Allowed)
    }
}
