//! Startup helpers.
//!
//! The shared store is optional: a missing URL or a failed connection both
//! leave the guard on its in-process state, with a warning for the latter.

use std::sync::Arc;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::store::{RedisStore, StoreHandle};

/// Connect the configured shared store, or `None` to run in-process only.
pub async fn connect_shared_store(config: &StoreConfig) -> Option<StoreHandle> {
    let url = config.redis_url.as_deref()?;
    let timeout = Duration::from_millis(config.timeout_ms);

    match tokio::time::timeout(timeout * 4, RedisStore::connect(url)).await {
        Ok(Ok(store)) => {
            tracing::info!(timeout_ms = config.timeout_ms, "Shared store connected");
            Some(StoreHandle::new(Arc::new(store), timeout))
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Shared store unavailable, using in-process state");
            None
        }
        Err(_) => {
            tracing::warn!("Shared store connection timed out, using in-process state");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_url_means_no_store() {
        assert!(connect_shared_store(&StoreConfig::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_store_degrades() {
        let config = StoreConfig {
            redis_url: Some("redis://127.0.0.1:1/".into()),
            timeout_ms: 100,
        };
        assert!(connect_shared_store(&config).await.is_none());
    }
}
