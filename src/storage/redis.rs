use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::error::StorageResult;
use crate::storage::StorageAdapter;

/// Remote-cache backend.
///
/// Reservation atomicity rides on `SET NX PX`, which the server applies
/// linearizably across all clients of the deployment.
pub struct RedisStorageAdapter {
    client: redis::Client,
}

impl RedisStorageAdapter {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn from_url(url: &str) -> StorageResult<Self> {
        Ok(Self::new(redis::Client::open(url)?))
    }

    async fn connection(&self) -> StorageResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl StorageAdapter for RedisStorageAdapter {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()> {
        let mut conn = self.connection().await?;

        match ttl {
            Some(ttl) => {
                let _: () = conn.pset_ex(key, value, ttl.as_millis() as u64).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }

        Ok(())
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StorageResult<bool> {
        let mut conn = self.connection().await?;

        let mut options =
            redis::SetOptions::default().conditional_set(redis::ExistenceCheck::NX);
        if let Some(ttl) = ttl {
            options = options.with_expiration(redis::SetExpiry::PX(ttl.as_millis() as usize));
        }

        // SET NX replies OK on creation and nil when a live key exists.
        let reply: Option<String> = conn.set_options(key, value, options).await?;
        Ok(reply.is_some())
    }

    async fn connect(&self) -> StorageResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn disconnect(&self) -> StorageResult<()> {
        // Multiplexed connections are per-call and close on drop.
        Ok(())
    }
}
