//! Persistence collaborator: refresh tokens, revoked access tokens, accounts.
//!
//! "Unreachable" must never be reported as "not found": every method returns
//! `PersistenceError` for a failed call and `Ok(None)` only for a real miss.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the persistence collaborator.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("backend unreachable: {0}")]
    Unavailable(String),

    #[error("record already exists: {0}")]
    Conflict(String),
}

/// A server-side refresh token. Only `revoked` is ever mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub jti: String,
    pub user_id: String,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds.
    pub expires_at: u64,
    pub revoked: bool,
}

/// Role and status of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub role: String,
    pub active: bool,
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), PersistenceError>;

    async fn find_refresh_token(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, PersistenceError>;

    /// Flip the `revoked` flag. Returns false when no record exists.
    async fn revoke_refresh_token(&self, jti: &str) -> Result<bool, PersistenceError>;

    /// Record an access token jti as revoked until `revoked_until` (unix seconds).
    async fn insert_revoked_token(&self, jti: &str, revoked_until: u64) -> Result<(), PersistenceError>;

    /// Returns the `revoked_until` timestamp for a jti, if recorded.
    async fn find_revoked_token(&self, jti: &str) -> Result<Option<u64>, PersistenceError>;

    async fn find_account(&self, id: &str) -> Result<Option<AccountRecord>, PersistenceError>;

    /// Delete revocation rows that ended before `now`. Returns the number deleted.
    async fn purge_expired_revocations(&self, now: u64) -> Result<u64, PersistenceError>;
}

/// Verifies login credentials for an account.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, user_id: &str, password: &str) -> Result<bool, PersistenceError>;
}

/// In-process persistence for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
    revoked: DashMap<String, u64>,
    accounts: DashMap<String, (AccountRecord, String)>,
    unavailable: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account with a plaintext development password.
    pub fn insert_account(&self, id: &str, role: &str, active: bool, password: &str) {
        let record = AccountRecord {
            id: id.to_string(),
            role: role.to_string(),
            active,
        };
        self.accounts.insert(id.to_string(), (record, password.to_string()));
    }

    /// Simulate an outage: every call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable("memory backend offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), PersistenceError> {
        self.check()?;
        if self.refresh_tokens.contains_key(&record.jti) {
            return Err(PersistenceError::Conflict(record.jti.clone()));
        }
        self.refresh_tokens.insert(record.jti.clone(), record.clone());
        Ok(())
    }

    async fn find_refresh_token(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, PersistenceError> {
        self.check()?;
        Ok(self.refresh_tokens.get(jti).map(|r| r.value().clone()))
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<bool, PersistenceError> {
        self.check()?;
        match self.refresh_tokens.get_mut(jti) {
            Some(mut record) => {
                record.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_revoked_token(&self, jti: &str, revoked_until: u64) -> Result<(), PersistenceError> {
        self.check()?;
        self.revoked
            .entry(jti.to_string())
            .and_modify(|until| *until = (*until).max(revoked_until))
            .or_insert(revoked_until);
        Ok(())
    }

    async fn find_revoked_token(&self, jti: &str) -> Result<Option<u64>, PersistenceError> {
        self.check()?;
        Ok(self.revoked.get(jti).map(|r| *r.value()))
    }

    async fn find_account(&self, id: &str) -> Result<Option<AccountRecord>, PersistenceError> {
        self.check()?;
        Ok(self.accounts.get(id).map(|r| r.value().0.clone()))
    }

    async fn purge_expired_revocations(&self, now: u64) -> Result<u64, PersistenceError> {
        self.check()?;
        let before = self.revoked.len();
        self.revoked.retain(|_, until| *until > now);
        Ok((before - self.revoked.len()) as u64)
    }
}

#[async_trait]
impl CredentialVerifier for MemoryPersistence {
    async fn verify(&self, user_id: &str, password: &str) -> Result<bool, PersistenceError> {
        self.check()?;
        Ok(self
            .accounts
            .get(user_id)
            .is_some_and(|entry| entry.value().1 == password))
    }
}
