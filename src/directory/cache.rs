//! Last-known-good directory snapshot on local disk.
//!
//! Both operations are best-effort: `load` never fails (a missing or
//! unreadable snapshot is an empty table) and `save` reports errors for the
//! caller to log.

use super::table::DirectoryTable;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Persistence contract for the directory snapshot.
pub trait DirectoryCache: Send + Sync {
    fn save(&self, table: &DirectoryTable) -> Result<()>;
    fn load(&self) -> DirectoryTable;
}

/// JSON file snapshot, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileDirectoryCache {
    path: PathBuf,
}

impl FileDirectoryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DirectoryCache for FileDirectoryCache {
    fn save(&self, table: &DirectoryTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write cache {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace cache {}", self.path.display()))?;

        tracing::info!(
            path = %self.path.display(),
            records = table.len(),
            "Directory cache saved"
        );
        Ok(())
    }

    fn load(&self) -> DirectoryTable {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Directory cache does not exist");
                return DirectoryTable::empty();
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    "Failed to read directory cache: {e}"
                );
                return DirectoryTable::empty();
            }
        };

        match serde_json::from_slice::<DirectoryTable>(&bytes) {
            Ok(table) => {
                tracing::info!(
                    path = %self.path.display(),
                    records = table.len(),
                    "Directory cache loaded"
                );
                table
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), "Corrupt directory cache: {e}");
                DirectoryTable::empty()
            }
        }
    }
}
