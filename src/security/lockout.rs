//! Failed-login lockout.
//!
//! With a shared store configured, state lives in two keys per account:
//! `login_fail:<id>` (failure counter, bounded TTL) and `login_lock:<id>`
//! (lock with TTL equal to the ladder step). Store errors degrade to the
//! in-process map so a store outage never blocks logins outright.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::LockoutConfig;
use crate::lifecycle::sweeper::Sweep;
use crate::observability::metrics;
use crate::security::penalty::{EscalationLadder, LOGIN_LOCKOUT_LADDER};
use crate::store::{StoreError, StoreHandle};

/// Lock state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    pub remaining: Duration,
}

impl LockStatus {
    const UNLOCKED: Self = Self {
        locked: false,
        remaining: Duration::ZERO,
    };

    fn locked_for(remaining: Duration) -> Self {
        if remaining.is_zero() {
            Self::UNLOCKED
        } else {
            Self {
                locked: true,
                remaining,
            }
        }
    }

    fn max(self, other: Self) -> Self {
        if other.remaining > self.remaining {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LocalFailures {
    failures: u32,
    locked_until: Instant,
    last_failure: Instant,
}

pub struct AccountLockout {
    store: Option<StoreHandle>,
    failure_ttl: Duration,
    ladder: EscalationLadder,
    local: Mutex<HashMap<String, LocalFailures>>,
}

impl AccountLockout {
    pub fn new(config: &LockoutConfig, store: Option<StoreHandle>) -> Self {
        Self {
            store,
            failure_ttl: Duration::from_secs(config.failure_ttl_secs),
            ladder: LOGIN_LOCKOUT_LADDER,
            local: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_locked(&self, user_id: &str) -> LockStatus {
        let local = self.local_status(user_id);
        let Some(store) = &self.store else {
            return local;
        };

        match store.ttl(&lock_key(user_id)).await {
            Ok(remaining) => local.max(LockStatus::locked_for(remaining.unwrap_or_default())),
            Err(e) => {
                self.degraded("lockout_check", user_id, &e);
                local
            }
        }
    }

    /// Count a failed login and lock the account for the matching ladder step.
    pub async fn record_failure(&self, user_id: &str) -> LockStatus {
        let status = match &self.store {
            Some(store) => match self.record_shared(store, user_id).await {
                Ok(status) => status,
                Err(e) => {
                    self.degraded("lockout_record", user_id, &e);
                    self.record_local(user_id)
                }
            },
            None => self.record_local(user_id),
        };

        metrics::record_account_lockout();
        tracing::warn!(
            user_id = %user_id,
            lock_secs = status.remaining.as_secs(),
            "Failed login, account locked"
        );
        status
    }

    /// Clear failures and any active lock. Called on successful authentication.
    pub async fn reset(&self, user_id: &str) {
        self.lock_local().remove(user_id);
        let Some(store) = &self.store else {
            return;
        };
        for key in [failure_key(user_id), lock_key(user_id)] {
            if let Err(e) = store.del(&key).await {
                self.degraded("lockout_reset", user_id, &e);
            }
        }
    }

    pub fn tracked_accounts(&self) -> usize {
        self.lock_local().len()
    }

    async fn record_shared(&self, store: &StoreHandle, user_id: &str) -> Result<LockStatus, StoreError> {
        let key = failure_key(user_id);
        let failures = store.incr(&key).await?;
        store.expire(&key, self.failure_ttl).await?;

        let lock = self.ladder.duration_for(u32::try_from(failures).unwrap_or(u32::MAX));
        store
            .set(&lock_key(user_id), &failures.to_string(), Some(lock))
            .await?;
        Ok(LockStatus::locked_for(lock))
    }

    fn record_local(&self, user_id: &str) -> LockStatus {
        let now = Instant::now();
        let mut local = self.lock_local();
        let entry = local.entry(user_id.to_string()).or_insert(LocalFailures {
            failures: 0,
            locked_until: now,
            last_failure: now,
        });
        if now - entry.last_failure >= self.failure_ttl {
            entry.failures = 0;
        }
        entry.failures += 1;
        entry.last_failure = now;
        let lock = self.ladder.duration_for(entry.failures);
        entry.locked_until = now + lock;
        LockStatus::locked_for(lock)
    }

    fn local_status(&self, user_id: &str) -> LockStatus {
        let now = Instant::now();
        self.lock_local()
            .get(user_id)
            .map_or(LockStatus::UNLOCKED, |entry| {
                LockStatus::locked_for(entry.locked_until.saturating_duration_since(now))
            })
    }

    fn degraded(&self, op: &'static str, user_id: &str, error: &StoreError) {
        metrics::record_store_fallback(op);
        tracing::warn!(
            user_id = %user_id,
            op,
            error = %error,
            "Shared store unavailable, using in-process lockout state"
        );
    }

    fn lock_local(&self) -> std::sync::MutexGuard<'_, HashMap<String, LocalFailures>> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sweep for AccountLockout {
    fn name(&self) -> &'static str {
        "lockout"
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let failure_ttl = self.failure_ttl;
        let mut local = self.lock_local();
        let before = local.len();
        local.retain(|_, entry| entry.locked_until > now || now - entry.last_failure < failure_ttl);
        before - local.len()
    }
}

fn failure_key(user_id: &str) -> String {
    format!("login_fail:{user_id}")
}

fn lock_key(user_id: &str) -> String {
    format!("login_lock:{user_id}")
}
