pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

pub use self::memory::{MemoryPurgeJob, MemoryStorageAdapter};
pub use self::redis::RedisStorageAdapter;

/// Capability contract the engine requires from a key-value backend.
///
/// `set_if_not_exists` is the sole concurrency-control primitive: it must
/// be linearizable across the backend's full deployment, so two callers
/// racing on the same key never both receive `true`. `get` must not
/// return expired entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns the stored value, or `None` when absent or expired.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Unconditional upsert with optional expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()>;

    /// Atomically creates the entry only if no live entry exists.
    /// Returns `true` on creation, `false` when a live entry is present.
    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StorageResult<bool>;

    /// Establishes a live connection, for backends that require one.
    async fn connect(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Releases backend resources on shutdown.
    async fn disconnect(&self) -> StorageResult<()> {
        Ok(())
    }
}
