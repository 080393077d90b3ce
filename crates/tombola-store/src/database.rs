//! Store handle and persistence discipline.
//!
//! One [`Store`] owns the backing JSON document.  Every operation locks the
//! document, applies its change, and either persists immediately or bumps
//! an auto-save counter that forces a save once enough mutations
//! accumulate.  A one-generation `.backup` copy is written before each
//! overwrite so manual recovery is always possible.
//!
//! Load behavior: a missing file yields a fresh document; a file that is
//! not valid JSON is logged and replaced with a fresh document (the backup
//! still holds the previous generation); valid JSON that does not decode
//! into the schema is a hard [`StoreError::Corrupt`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use directories::ProjectDirs;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::document::{migrate, Document};
use crate::error::{Result, StoreError};
use crate::logs;
use crate::models::LogKind;

/// Mutations tolerated before a deferred save is forced.
pub(crate) const AUTO_SAVE_THRESHOLD: u32 = 10;

#[derive(Debug)]
pub(crate) struct Inner {
    pub doc: Document,
    /// Mutations applied since the last save.
    pub pending: u32,
}

/// Handle to the giveaway document store.  Cheap to clone; all clones share
/// one lock, so mutating operations are mutually exclusive.
#[derive(Clone, Debug)]
pub struct Store {
    inner: Arc<Mutex<Inner>>,
    path: Arc<PathBuf>,
}

impl Store {
    /// Open (or create) the store in the platform data directory, e.g.
    /// `~/.local/share/tombola/tombola.json` on Linux.
    pub fn open_default() -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "tombola", "tombola").ok_or(StoreError::NoDataDir)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        Self::open_at(&data_dir.join("tombola.json"))
    }

    /// Open (or create) a store at an explicit path.  Used by tests and by
    /// deployments with custom directory layouts.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (mut doc, fresh) = load_document(path)?;
        if migrate(&mut doc) || fresh {
            write_document(path, &doc)?;
        }

        info!(
            path = %path.display(),
            giveaways = doc.giveaways.len(),
            "opened giveaway store"
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner { doc, pending: 0 })),
            path: Arc::new(path.to_path_buf()),
        })
    }

    /// Filesystem path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Force a save of any pending mutations.
    pub async fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.persist(&mut inner)
    }

    /// Evict expired cooldowns and prune audit logs older than
    /// `log_retention`, stamping the cleanup timestamp.  Meant to run from
    /// a periodic housekeeping task.
    pub async fn run_maintenance(&self, log_retention: Duration) -> Result<MaintenanceReport> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        let before = inner.doc.user_cooldowns.len();
        inner.doc.user_cooldowns.retain(|_, cd| cd.expires_at > now);
        let cooldowns_evicted = before - inner.doc.user_cooldowns.len();

        let cutoff = now - log_retention;
        let before = inner.doc.logs.len();
        inner.doc.logs.retain(|entry| entry.timestamp > cutoff);
        let logs_pruned = before - inner.doc.logs.len();

        inner.doc.settings.last_cleanup = now;
        if cooldowns_evicted > 0 || logs_pruned > 0 {
            logs::append(
                &mut inner.doc,
                LogKind::Cleanup,
                0,
                None,
                format!("evicted {cooldowns_evicted} cooldowns, pruned {logs_pruned} log entries"),
            );
        }
        self.persist(&mut inner)?;

        debug!(cooldowns_evicted, logs_pruned, "maintenance pass complete");
        Ok(MaintenanceReport {
            cooldowns_evicted,
            logs_pruned,
        })
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().await
    }

    /// Save now and reset the auto-save counter.
    pub(crate) fn persist(&self, inner: &mut Inner) -> Result<()> {
        write_document(&self.path, &inner.doc)?;
        inner.pending = 0;
        Ok(())
    }

    /// Deferred durability: save only once [`AUTO_SAVE_THRESHOLD`]
    /// mutations have accumulated.  Callers that need the change on disk
    /// sooner use [`Store::flush`].
    pub(crate) fn persist_batched(&self, inner: &mut Inner) -> Result<()> {
        inner.pending += 1;
        if inner.pending >= AUTO_SAVE_THRESHOLD {
            self.persist(inner)
        } else {
            Ok(())
        }
    }
}

/// Counts from one [`Store::run_maintenance`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub cooldowns_evicted: usize,
    pub logs_pruned: usize,
}

fn load_document(path: &Path) -> Result<(Document, bool)> {
    if !path.exists() {
        return Ok((Document::default(), true));
    }

    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "store file is not valid JSON, starting fresh"
            );
            return Ok((Document::default(), true));
        }
    };

    let doc = serde_json::from_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok((doc, false))
}

fn write_document(path: &Path, doc: &Document) -> Result<()> {
    if path.exists() {
        std::fs::copy(path, backup_path(path))?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), "store saved");
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".backup");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = Store::open_at(&path).expect("should open");
        assert!(path.exists());
        assert_eq!(store.path(), path);
    }

    #[test]
    fn invalid_json_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        Store::open_at(&path).expect("corrupt file should fall back to empty store");
    }

    #[test]
    fn schema_mismatch_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        // Valid JSON, but "paused" is not a known status.
        std::fs::write(
            &path,
            r#"{"giveaways": {"GIV_X": {"id": "GIV_X", "status": "paused"}}}"#,
        )
        .unwrap();

        let err = Store::open_at(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn backup_written_before_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = Store::open_at(&path).unwrap();
        store.flush().await.unwrap();

        let backup = dir.path().join("store.json.backup");
        assert!(backup.exists());
    }

    #[tokio::test]
    async fn maintenance_evicts_expired_cooldowns() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("store.json")).unwrap();

        store
            .set_cooldown(7, "participate", Duration::seconds(-5))
            .await
            .unwrap();
        store
            .set_cooldown(8, "participate", Duration::hours(1))
            .await
            .unwrap();

        let report = store.run_maintenance(Duration::days(30)).await.unwrap();
        assert_eq!(report.cooldowns_evicted, 1);
    }
}
