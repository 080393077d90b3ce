//! # tombola-engine
//!
//! Giveaway lifecycle engine: the validation gate participants pass
//! through, the uniform winner selector, and the time-driven scheduler
//! that transitions each giveaway from ACTIVE to ENDED exactly once —
//! surviving restarts and missed timers by recomputing from the store.
//!
//! Platform specifics stay outside: membership checks and outbound text go
//! through the [`traits::SubscriptionOracle`] and
//! [`traits::NotificationSink`] contracts, injected at construction.

pub mod announce;
pub mod clock;
pub mod scheduler;
pub mod selector;
pub mod service;
pub mod traits;
pub mod validate;

mod error;

pub use error::EngineError;
pub use scheduler::{EndOutcome, GiveawayScheduler, SchedulerOptions};
pub use service::{GiveawayService, ServiceOptions, ACTION_PARTICIPATE};
pub use traits::{
    ChannelRef, MissingChannel, NotificationSink, NotifyError, NotifyTarget, SubscriptionOracle,
    SubscriptionReport,
};
pub use validate::{DenyReason, ValidationGate, Verdict};
