use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::storage::StorageAdapter;

#[derive(Debug, Clone)]
struct StoredEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Utc::now() + chrono::Duration::milliseconds(ttl.as_millis() as i64)),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() > expires_at)
    }
}

/// Reference in-memory backend.
///
/// A single mutex guards the map, which makes `set_if_not_exists`
/// trivially linearizable within one process. Expired entries are dropped
/// on read; `purge_expired` reclaims the rest.
#[derive(Debug, Default)]
pub struct MemoryStorageAdapter {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStorageAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, StoredEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorageAdapter {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut entries = self.entries();

        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()> {
        self.entries()
            .insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(())
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StorageResult<bool> {
        let mut entries = self.entries();

        if let Some(existing) = entries.get(key) {
            if !existing.is_expired() {
                return Ok(false);
            }
        }

        entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(true)
    }
}

/// Background sweep reclaiming expired entries from a memory adapter.
///
/// Correctness never depends on it: expired entries are already invisible
/// to readers. It only bounds the adapter's memory footprint.
pub struct MemoryPurgeJob {
    adapter: Arc<MemoryStorageAdapter>,
    interval: Duration,
}

impl MemoryPurgeJob {
    pub fn new(adapter: Arc<MemoryStorageAdapter>, interval: Duration) -> Self {
        Self { adapter, interval }
    }

    /// Runs one sweep.
    pub fn run_once(&self) -> usize {
        self.adapter.purge_expired()
    }

    /// Starts the sweep loop in a background task.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                interval.tick().await;

                let purged = self.adapter.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "purged expired idempotency entries");
                }
            }
        })
    }
}
