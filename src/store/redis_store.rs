//! Redis-backed shared store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use super::shared::{SharedStore, StoreError};

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Shared store over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!("Failed to create Redis client: {}", e);
            StoreError::from(e)
        })?;

        let connection_manager = ConnectionManager::new(client).await?;

        let mut conn = connection_manager.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;

        debug!("Connected to shared store");

        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection_manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.connection_manager.clone();
        match ttl {
            Some(ttl) => {
                let () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection_manager.clone();
        Ok(conn.incr(key, 1_i64).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection_manager.clone();
        let secs = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);
        Ok(conn.expire(key, secs).await?)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection_manager.clone();
        // -2: missing key, -1: no expiry
        let secs: i64 = conn.ttl(key).await?;
        Ok(u64::try_from(secs)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs))
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection_manager.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }
}
