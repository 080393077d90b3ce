//! # tombola-store
//!
//! Durable record store for the giveaway engine.
//!
//! All state lives in a single JSON document (giveaways, participants,
//! winners, bans, broadcast chats, cooldowns, audit logs, user stats).
//! The crate exposes a cloneable [`Store`] handle whose operations are
//! serialized behind one async lock; every mutation is saved immediately
//! or through a small auto-save batch, with a one-generation backup kept
//! before each overwrite.

pub mod backup;
pub mod bans;
pub mod broadcasts;
pub mod cooldowns;
pub mod database;
pub mod giveaways;
pub mod logs;
pub mod models;
pub mod participants;
pub mod stats;
pub mod winners;

mod document;
mod error;

pub use database::{MaintenanceReport, Store};
pub use document::StoreSettings;
pub use error::StoreError;
pub use giveaways::NewGiveaway;
pub use logs::LogFilter;
pub use models::*;
pub use participants::JoinError;
pub use stats::{StatKind, StoreStats};
pub use winners::WinnerOutcome;
