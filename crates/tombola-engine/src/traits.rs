//! Boundary contracts implemented by platform adapters.
//!
//! The engine never talks to the chat platform directly: membership
//! questions go through a [`SubscriptionOracle`] and outbound text goes
//! through a [`NotificationSink`].  Both are injected at construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tombola_store::{ChatId, UserId};

/// Reference to a required channel (platform handle or id).
pub type ChannelRef = String;

/// A channel the user still needs to join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingChannel {
    pub channel: ChannelRef,
    pub display_name: String,
}

/// Result of a batched membership query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionReport {
    pub all_subscribed: bool,
    pub missing: Vec<MissingChannel>,
}

impl SubscriptionReport {
    /// The user belongs to every required channel.
    pub fn subscribed() -> Self {
        Self {
            all_subscribed: true,
            missing: Vec::new(),
        }
    }

    /// Fail-closed report: every queried channel is treated as missing,
    /// with the reference itself as the best-effort display name.
    pub fn fail_closed(channels: &[ChannelRef]) -> Self {
        Self {
            all_subscribed: channels.is_empty(),
            missing: channels
                .iter()
                .map(|c| MissingChannel {
                    channel: c.clone(),
                    display_name: c.clone(),
                })
                .collect(),
        }
    }
}

/// Answers membership queries for required channels.  An unreachable or
/// unknown channel must be reported as not subscribed (fail closed), never
/// silently skipped.
#[async_trait]
pub trait SubscriptionOracle: Send + Sync {
    async fn check_all(&self, user_id: UserId, channels: &[ChannelRef]) -> SubscriptionReport;
}

/// Where a notification is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyTarget {
    Chat(ChatId),
    User(UserId),
}

/// A single failed delivery.  Never aborts a batch of sends to other
/// targets.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers text to a chat or user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, target: NotifyTarget, text: &str) -> Result<(), NotifyError>;
}
