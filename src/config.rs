use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::IdempotencyOptions;
use crate::storage::{MemoryStorageAdapter, RedisStorageAdapter, StorageAdapter};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub storage: StorageSettings,
    pub idempotency: IdempotencySettings,
    pub application: ApplicationSettings,
}

/// Backend variant, selected by configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencySettings {
    pub header_name: String,
    pub cache_key_prefix: String,
    pub cache_ttl_ms: u64,
    pub key_max_length: usize,
    pub enforce: bool,
}

impl IdempotencySettings {
    pub fn to_options(&self) -> IdempotencyOptions {
        IdempotencyOptions::new()
            .idempotency_key_header(self.header_name.clone())
            .cache_key_prefix(self.cache_key_prefix.clone())
            .cache_ttl(Duration::from_millis(self.cache_ttl_ms))
            .key_max_length(self.key_max_length)
            .enforce_idempotency(self.enforce)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub log_level: String,
    pub log_format: String,
}

impl Settings {
    /// Layered load: baked-in defaults, then `config/default` and
    /// `config/local` files when present, then `IDEMPOTENCY__*`
    /// environment variables.
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .set_default("storage.backend", "memory")?
            .set_default("idempotency.header_name", "idempotency-key")?
            .set_default("idempotency.cache_key_prefix", "")?
            .set_default("idempotency.cache_ttl_ms", 86_400_000u64)?
            .set_default("idempotency.key_max_length", 256u64)?
            .set_default("idempotency.enforce", false)?
            .set_default("application.log_level", "info")?
            .set_default("application.log_format", "pretty")?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("IDEMPOTENCY").separator("__"));

        builder.build()?.try_deserialize()
    }
}

/// Constructs the configured backend and brings up its connection.
///
/// Callers owning the process lifecycle should pair this with
/// `disconnect` on shutdown.
pub async fn build_storage_adapter(
    settings: &StorageSettings,
) -> anyhow::Result<Arc<dyn StorageAdapter>> {
    match settings.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorageAdapter::new())),
        StorageBackend::Redis => {
            let url = settings.redis_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("storage.redis_url is required for the redis backend")
            })?;
            let adapter = RedisStorageAdapter::from_url(url)?;
            adapter.connect().await?;
            Ok(Arc::new(adapter))
        }
    }
}
