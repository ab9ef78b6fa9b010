pub mod handler;
pub mod key;
pub mod options;
pub mod record;

pub use handler::{EngineMetrics, Idempotency, MetricsSnapshot};
pub use key::{build_storage_key, fingerprint, RequestIdentity};
pub use options::{
    IdempotencyOptions, KeyExtractorFn, RequestDescriptor, ResolvedOptions, SkipPredicateFn,
    DEFAULT_CACHE_TTL, DEFAULT_IDEMPOTENCY_KEY_HEADER, DEFAULT_KEY_MAX_LENGTH,
};
pub use record::{CachedResponse, IdempotencyRecord, RecordStatus};
