//! On-demand exports of the full document and restores from them.
//!
//! Distinct from the automatic one-generation `.backup` written before
//! every save: these are timestamped snapshots an operator triggers.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::database::Store;
use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::logs;
use crate::models::LogKind;

impl Store {
    /// Write a timestamped JSON export of the document under `dir`,
    /// returning its path.
    pub async fn backup_to(&self, dir: &Path) -> Result<PathBuf> {
        let mut inner = self.lock().await;
        let path = export(&inner.doc, dir)?;
        logs::append(
            &mut inner.doc,
            LogKind::Backup,
            0,
            None,
            format!("exported to {}", path.display()),
        );
        self.persist_batched(&mut inner)?;
        info!(path = %path.display(), "store exported");
        Ok(path)
    }

    /// Replace the live document with the contents of `path`.  The current
    /// data is exported to `fallback_dir` first so the operation can be
    /// undone by hand.
    pub async fn restore_from(&self, path: &Path, fallback_dir: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let mut restored: Document =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        crate::document::migrate(&mut restored);

        let mut inner = self.lock().await;
        let fallback = export(&inner.doc, fallback_dir)?;
        inner.doc = restored;
        logs::append(
            &mut inner.doc,
            LogKind::Restore,
            0,
            None,
            format!(
                "restored from {}; previous data exported to {}",
                path.display(),
                fallback.display()
            ),
        );
        self.persist(&mut inner)?;
        info!(path = %path.display(), "store restored");
        Ok(())
    }
}

fn export(doc: &Document, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let name = format!("tombola_backup_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(doc)?)?;
    Ok(path)
}
