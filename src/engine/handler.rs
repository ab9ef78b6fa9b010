use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::key::RequestIdentity;
use crate::engine::options::{IdempotencyOptions, RequestDescriptor, ResolvedOptions};
use crate::engine::record::{CachedResponse, IdempotencyRecord, RecordStatus};
use crate::error::{IdempotencyError, Result, StorageError};
use crate::storage::StorageAdapter;

/// Initial reservation attempt plus one retry for the window where a
/// record expires between the failed reservation and the follow-up fetch.
const RESERVATION_ATTEMPTS: usize = 2;

/// Counters for idempotency handling.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub total_requests: AtomicU64,
    pub skipped_requests: AtomicU64,
    pub new_requests: AtomicU64,
    pub replayed_responses: AtomicU64,
    pub in_progress_rejections: AtomicU64,
    pub key_conflicts: AtomicU64,
    pub completed_responses: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_new(&self) {
        self.new_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replay(&self) {
        self.replayed_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_in_progress(&self) {
        self.in_progress_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.key_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn replay_rate(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        let replayed = self.replayed_responses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            replayed as f64 / total as f64
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            skipped_requests: self.skipped_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
            replayed_responses: self.replayed_responses.load(Ordering::Relaxed),
            in_progress_rejections: self.in_progress_rejections.load(Ordering::Relaxed),
            key_conflicts: self.key_conflicts.load(Ordering::Relaxed),
            completed_responses: self.completed_responses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub skipped_requests: u64,
    pub new_requests: u64,
    pub replayed_responses: u64,
    pub in_progress_rejections: u64,
    pub key_conflicts: u64,
    pub completed_responses: u64,
}

impl MetricsSnapshot {
    pub fn replay_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.replayed_responses as f64 / self.total_requests as f64
        }
    }
}

/// How the classifier routed a request.
enum Classification {
    /// Bypass idempotency control; execute with no caching side effects.
    Skip,
    Process(RequestIdentity),
}

/// The idempotency engine.
///
/// Stateless apart from the storage adapter: any number of concurrent
/// callers across any number of processes coordinate solely through the
/// adapter's atomic `set_if_not_exists`. The adapter is touched once at
/// `on_request` and once at `on_response`; the protected operation runs
/// entirely outside any held resource.
pub struct Idempotency {
    storage: Arc<dyn StorageAdapter>,
    defaults: ResolvedOptions,
    metrics: Arc<EngineMetrics>,
}

impl Idempotency {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self::with_options(storage, IdempotencyOptions::default())
    }

    pub fn with_options(storage: Arc<dyn StorageAdapter>, options: IdempotencyOptions) -> Self {
        Self {
            storage,
            defaults: ResolvedOptions::from_defaults(&options),
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Pre-execution entry point.
    ///
    /// Returns `Ok(None)` when the caller should execute the protected
    /// operation (first reservation, or a request that bypasses control)
    /// and `Ok(Some(response))` when a completed outcome must be replayed
    /// verbatim instead of executing.
    pub async fn on_request(
        &self,
        descriptor: &RequestDescriptor,
        options: Option<&IdempotencyOptions>,
    ) -> Result<Option<CachedResponse>> {
        self.metrics.record_request();
        let resolved = self.defaults.merge(options);

        let identity = match self.classify(descriptor, &resolved)? {
            Classification::Skip => {
                self.metrics.record_skipped();
                return Ok(None);
            }
            Classification::Process(identity) => identity,
        };

        let placeholder = IdempotencyRecord::in_progress(identity.fingerprint.clone());
        let encoded = placeholder.encode()?;

        for _ in 0..RESERVATION_ATTEMPTS {
            let reserved = self
                .storage
                .set_if_not_exists(&identity.storage_key, &encoded, Some(resolved.cache_ttl))
                .await?;

            if reserved {
                tracing::debug!(key = %identity.storage_key, "reserved idempotency key");
                self.metrics.record_new();
                return Ok(None);
            }

            let Some(raw) = self.storage.get(&identity.storage_key).await? else {
                // The live record expired between the reservation attempt
                // and this fetch; reserve again.
                continue;
            };
            let existing = IdempotencyRecord::decode(&raw)?;

            // A mismatched fingerprint is caller misuse and takes
            // precedence over the in-progress signal.
            if existing.fingerprint != identity.fingerprint {
                self.metrics.record_conflict();
                return Err(IdempotencyError::KeyConflict);
            }

            return match existing.status {
                RecordStatus::InProgress => {
                    self.metrics.record_in_progress();
                    Err(IdempotencyError::RequestInProgress)
                }
                RecordStatus::Complete => {
                    let response = existing.response.ok_or_else(|| {
                        StorageError::Other(anyhow::anyhow!(
                            "completed record for key {} has no response",
                            identity.storage_key
                        ))
                    })?;
                    tracing::debug!(key = %identity.storage_key, "replaying cached response");
                    self.metrics.record_replay();
                    Ok(Some(response))
                }
            };
        }

        Err(StorageError::Other(anyhow::anyhow!(
            "reservation for key {} kept racing with expiry",
            identity.storage_key
        ))
        .into())
    }

    /// Post-execution entry point.
    ///
    /// Persists the outcome, overwriting the reservation placeholder.
    /// Failures are persisted the same as successes, so a retried failed
    /// request does not re-execute side effects either. A no-op for
    /// requests the classifier skipped. Persistence failure is a
    /// caching-layer fault: it is returned, but the already-delivered
    /// outcome stands.
    pub async fn on_response(
        &self,
        descriptor: &RequestDescriptor,
        options: Option<&IdempotencyOptions>,
        outcome: CachedResponse,
    ) -> Result<()> {
        let resolved = self.defaults.merge(options);

        let identity = match self.classify(descriptor, &resolved)? {
            Classification::Skip => return Ok(()),
            Classification::Process(identity) => identity,
        };

        let record = IdempotencyRecord::complete(identity.fingerprint.clone(), outcome);
        let encoded = record.encode()?;

        self.storage
            .set(&identity.storage_key, &encoded, Some(resolved.cache_ttl))
            .await?;

        tracing::debug!(key = %identity.storage_key, "cached completed response");
        self.metrics.record_completed();
        Ok(())
    }

    /// Decides whether a request participates in idempotency control.
    ///
    /// The skip predicate runs before key extraction and validation, so a
    /// skipping caller never sees key errors.
    fn classify(
        &self,
        descriptor: &RequestDescriptor,
        resolved: &ResolvedOptions,
    ) -> Result<Classification> {
        if let Some(ref skip) = resolved.skip_request {
            if skip(descriptor) {
                return Ok(Classification::Skip);
            }
        }

        let idempotency_key = match resolved.idempotency_key_extractor {
            Some(ref extractor) => extractor(descriptor),
            None => descriptor
                .header(&resolved.idempotency_key_header)
                .map(str::to_string),
        };

        let Some(idempotency_key) = idempotency_key.filter(|key| !key.is_empty()) else {
            if resolved.enforce_idempotency {
                return Err(IdempotencyError::MissingKey);
            }
            return Ok(Classification::Skip);
        };

        if idempotency_key.len() > resolved.key_max_length {
            return Err(IdempotencyError::KeyTooLong {
                max: resolved.key_max_length,
            });
        }

        Ok(Classification::Process(RequestIdentity::derive(
            &resolved.cache_key_prefix,
            descriptor,
            &idempotency_key,
        )))
    }
}
