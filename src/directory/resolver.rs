//! Resolves the authoritative directory table from the remote source, with
//! fallback to the local snapshot.
//!
//! Order on every refresh:
//! 1. Remote source (bounded by a timeout). A non-empty resident table is
//!    installed and persisted to the cache; persistence is best-effort.
//! 2. Local cache, when the remote fails, times out, or has no residents.
//! 3. `DirectoryError::Unavailable` when both are empty. The table already in
//!    memory is kept as-is so an outage never clears it.
//!
//! Readers hold an `Arc` snapshot, so a refresh swapping the table never
//! exposes a partially built one.

use super::cache::DirectoryCache;
use super::source::DirectorySource;
use super::table::DirectoryTable;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single remote read.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Neither the remote directory nor the local snapshot produced residents.
    #[error("directory unavailable: cannot verify credentials right now")]
    Unavailable,
}

/// Where the last successful refresh came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableOrigin {
    Remote,
    Cache,
}

pub struct DirectoryResolver {
    source: Arc<dyn DirectorySource>,
    cache: Arc<dyn DirectoryCache>,
    timeout: Duration,
    current: RwLock<Arc<DirectoryTable>>,
}

impl DirectoryResolver {
    pub fn new(source: Arc<dyn DirectorySource>, cache: Arc<dyn DirectoryCache>) -> Self {
        Self {
            source,
            cache,
            timeout: DEFAULT_SOURCE_TIMEOUT,
            current: RwLock::new(Arc::new(DirectoryTable::empty())),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Snapshot of the table currently in memory.
    pub fn table(&self) -> Arc<DirectoryTable> {
        self.current.read().clone()
    }

    /// Rebuild the table and swap it in. On `Unavailable` the previous table stays.
    pub async fn refresh(&self) -> Result<Arc<DirectoryTable>, DirectoryError> {
        let (table, origin) = self.resolve().await?;
        *self.current.write() = Arc::clone(&table);
        tracing::info!(records = table.len(), origin = ?origin, "Directory table refreshed");
        Ok(table)
    }

    async fn resolve(&self) -> Result<(Arc<DirectoryTable>, TableOrigin), DirectoryError> {
        match self.fetch_remote().await {
            Some(table) if !table.is_empty() => {
                let table = Arc::new(table);
                self.persist(Arc::clone(&table)).await;
                return Ok((table, TableOrigin::Remote));
            }
            Some(_) => tracing::warn!("Remote directory returned no residents; trying cache"),
            None => {}
        }

        let cached = self.load_cached().await;
        if cached.is_empty() {
            tracing::error!("Directory unavailable: remote failed and cache is empty");
            return Err(DirectoryError::Unavailable);
        }
        Ok((Arc::new(cached), TableOrigin::Cache))
    }

    /// Best-effort snapshot write, off the async workers.
    async fn persist(&self, table: Arc<DirectoryTable>) {
        let cache = Arc::clone(&self.cache);
        match tokio::task::spawn_blocking(move || cache.save(&table)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to persist directory cache: {e:#}"),
            Err(e) => tracing::warn!("Directory cache write task failed: {e}"),
        }
    }

    async fn load_cached(&self) -> DirectoryTable {
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || cache.load())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Directory cache read task failed: {e}");
                DirectoryTable::empty()
            })
    }

    /// Remote read projected to residents; `None` on failure or timeout.
    async fn fetch_remote(&self) -> Option<DirectoryTable> {
        match tokio::time::timeout(self.timeout, self.source.list_records()).await {
            Ok(Ok(rows)) => Some(DirectoryTable::from_records(
                rows.iter().filter_map(|row| row.to_record()),
            )),
            Ok(Err(e)) => {
                tracing::warn!("Remote directory read failed: {e:#}");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Remote directory read timed out"
                );
                None
            }
        }
    }
}
