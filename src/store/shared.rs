//! Optional shared key-value store used for cross-instance state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::error::Elapsed;

use crate::resilience::timeouts::call_with_timeout;

/// Errors returned by a shared store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out")]
    Timeout(#[from] Elapsed),

    #[error("unexpected store value: {0}")]
    Protocol(String),
}

/// Minimal key-value contract: string keys, string values, expiry in seconds.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Atomically increment an integer key, creating it at 1. Keeps any existing expiry.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set the expiry of an existing key. Returns false when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining lifetime, `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;
}

/// A configured shared store with a deadline applied to every call.
///
/// Call sites hold an `Option<StoreHandle>`; `None` means no shared store is
/// configured and the in-memory path is used.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn SharedStore>,
    timeout: Duration,
}

impl StoreHandle {
    pub fn new(inner: Arc<dyn SharedStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        call_with_timeout(self.timeout, self.inner.get(key)).await
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        call_with_timeout(self.timeout, self.inner.set(key, value, ttl)).await
    }

    pub async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        call_with_timeout(self.timeout, self.inner.incr(key)).await
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        call_with_timeout(self.timeout, self.inner.expire(key, ttl)).await
    }

    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        call_with_timeout(self.timeout, self.inner.ttl(key)).await
    }

    pub async fn del(&self, key: &str) -> Result<(), StoreError> {
        call_with_timeout(self.timeout, self.inner.del(key)).await
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("timeout", &self.timeout)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_handle_applies_deadline() {
        let handle = hanging();
        assert!(matches!(handle.get("k").await, Err(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_handle_propagates_errors() {
        let handle = failing();
        assert!(matches!(handle.incr("k").await, Err(StoreError::Unavailable(_))));
    }
}
