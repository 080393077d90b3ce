//! Bounded audit log.

use chrono::Utc;
use uuid::Uuid;

use crate::database::Store;
use crate::document::{Document, MAX_LOG_ENTRIES};
use crate::error::Result;
use crate::models::{LogEntry, LogKind, UserId};

/// Append an entry, keeping only the most recent [`MAX_LOG_ENTRIES`].
pub(crate) fn append(
    doc: &mut Document,
    kind: LogKind,
    actor: UserId,
    giveaway_id: Option<String>,
    detail: impl Into<String>,
) {
    doc.logs.push(LogEntry {
        id: Uuid::new_v4(),
        kind,
        actor,
        giveaway_id,
        detail: detail.into(),
        timestamp: Utc::now(),
    });
    if doc.logs.len() > MAX_LOG_ENTRIES {
        let excess = doc.logs.len() - MAX_LOG_ENTRIES;
        doc.logs.drain(..excess);
    }
}

/// Optional filters for [`Store::recent_logs`].
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub kind: Option<LogKind>,
    pub actor: Option<UserId>,
    pub giveaway_id: Option<String>,
}

impl Store {
    /// Append an audit entry.  Deferred save.
    pub async fn append_log(
        &self,
        kind: LogKind,
        actor: UserId,
        giveaway_id: Option<String>,
        detail: impl Into<String>,
    ) -> Result<()> {
        let mut inner = self.lock().await;
        append(&mut inner.doc, kind, actor, giveaway_id, detail);
        self.persist_batched(&mut inner)
    }

    /// The most recent entries, newest first, optionally filtered.
    pub async fn recent_logs(&self, limit: usize, filter: LogFilter) -> Vec<LogEntry> {
        let inner = self.lock().await;
        let mut entries: Vec<LogEntry> = inner
            .doc
            .logs
            .iter()
            .filter(|e| filter.kind.map_or(true, |k| e.kind == k))
            .filter(|e| filter.actor.map_or(true, |a| e.actor == a))
            .filter(|e| {
                filter
                    .giveaway_id
                    .as_ref()
                    .map_or(true, |g| e.giveaway_id.as_deref() == Some(g.as_str()))
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        entries
    }
}
