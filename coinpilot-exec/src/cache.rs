//! Asset directory cache.
//!
//! Holds the last fetched directory for a bounded lifetime. The executor
//! invalidates it when a resolution fails against a cached copy, so a stale
//! directory never outlives its TTL by more than one failed lookup.

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

use coinpilot_domain::AssetDirectory;

use crate::error::ExecError;
use crate::ports::ExchangePort;

/// Where a directory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorySource {
    Cache,
    Exchange,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    directory: Arc<AssetDirectory>,
    fetched_at: DateTime<Utc>,
}

/// TTL cache for the asset directory.
pub struct DirectoryCache {
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl DirectoryCache {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached directory if present and younger than the TTL.
    pub fn get(&self) -> Option<Arc<AssetDirectory>> {
        let guard = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        let entry = guard.as_ref()?;

        let age = (Utc::now() - entry.fetched_at).to_std().unwrap_or(Duration::ZERO);
        if age < self.ttl {
            Some(Arc::clone(&entry.directory))
        } else {
            None
        }
    }

    /// Store a freshly fetched directory.
    pub fn store(&self, directory: AssetDirectory) -> Arc<AssetDirectory> {
        let directory = Arc::new(directory);
        let mut guard = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(CacheEntry {
            directory: Arc::clone(&directory),
            fetched_at: Utc::now(),
        });
        directory
    }

    /// Drop the cached directory.
    pub fn invalidate(&self) {
        let mut guard = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!("Asset directory cache invalidated");
        }
    }

    /// Cached directory, or a fresh one from `exchange` (which is then cached).
    pub async fn get_or_fetch<E>(
        &self,
        exchange: &E,
    ) -> Result<(Arc<AssetDirectory>, DirectorySource), ExecError>
    where
        E: ExchangePort + ?Sized,
    {
        if let Some(directory) = self.get() {
            debug!(assets = directory.len(), "Asset directory served from cache");
            return Ok((directory, DirectorySource::Cache));
        }

        let directory = exchange.fetch_asset_directory().await?;
        Ok((self.store(directory), DirectorySource::Exchange))
    }
}
