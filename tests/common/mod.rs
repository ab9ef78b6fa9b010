use std::sync::Arc;

use idempotency_engine::engine::{Idempotency, IdempotencyOptions, RequestDescriptor};
use idempotency_engine::storage::{MemoryStorageAdapter, StorageAdapter};

pub fn setup_engine() -> (Idempotency, Arc<MemoryStorageAdapter>) {
    setup_engine_with_options(IdempotencyOptions::default())
}

pub fn setup_engine_with_options(
    options: IdempotencyOptions,
) -> (Idempotency, Arc<MemoryStorageAdapter>) {
    let storage = Arc::new(MemoryStorageAdapter::new());
    let engine = Idempotency::with_options(
        Arc::clone(&storage) as Arc<dyn StorageAdapter>,
        options,
    );
    (engine, storage)
}

/// The `POST /pay` request used throughout: body `{"a":"a"}`, key in the
/// default idempotency header.
pub fn pay_request(idempotency_key: &str) -> RequestDescriptor {
    RequestDescriptor::new("POST", "/pay")
        .with_header("idempotency-key", idempotency_key)
        .with_body(serde_json::json!({"a": "a"}))
}

pub fn unique_key() -> String {
    uuid::Uuid::new_v4().to_string()
}
