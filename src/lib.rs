pub mod config;
pub mod engine;
pub mod error;
pub mod observability;
pub mod storage;

pub use engine::{
    CachedResponse, Idempotency, IdempotencyOptions, IdempotencyRecord, RecordStatus,
    RequestDescriptor,
};
pub use error::{IdempotencyError, Result, StorageError, StorageResult};
pub use storage::{MemoryStorageAdapter, RedisStorageAdapter, StorageAdapter};
