//! Per-user rate limiting with escalating penalty locks.
//!
//! # Penalty model
//! ```text
//! window exceeded        → level += 1, locked for ladder[level]
//! request while locked   → rejected, no slot consumed, no escalation
//! lock expired           → evaluated fresh against the window
//! violation < 1 window after expiry → ladder advances
//! 1 window after expiry, no violation → level back to 0
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::Instant;

use crate::config::UserRateLimitConfig;
use crate::lifecycle::sweeper::Sweep;
use crate::security::headers::{RateLimitOutcome, RateLimitStatus};
use crate::security::path_under;
use crate::security::penalty::{EscalationLadder, USER_PENALTY_LADDER};
use crate::security::window::{SlidingWindow, WindowDecision};

/// Window length for every user category.
pub const USER_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    Auth,
    Admin,
    Upload,
    Api,
}

impl EndpointCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Admin => "admin",
            Self::Upload => "upload",
            Self::Api => "api",
        }
    }

    /// Classify `path` by the configured prefixes.
    pub fn classify(path: &str, config: &UserRateLimitConfig) -> Self {
        if path_under(path, &config.auth_path_prefix) {
            Self::Auth
        } else if path_under(path, &config.admin_path_prefix) {
            Self::Admin
        } else if path_under(path, &config.upload_path_prefix) {
            Self::Upload
        } else {
            Self::Api
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PenaltyState {
    level: u32,
    locked_until: Instant,
}

pub struct UserRateLimiter {
    config: ArcSwap<UserRateLimitConfig>,
    window: SlidingWindow,
    penalties: Mutex<HashMap<String, PenaltyState>>,
    ladder: EscalationLadder,
}

impl UserRateLimiter {
    pub fn new(config: UserRateLimitConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            window: SlidingWindow::new(),
            penalties: Mutex::new(HashMap::new()),
            ladder: USER_PENALTY_LADDER,
        }
    }

    pub fn reconfigure(&self, config: UserRateLimitConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn is_enabled(&self) -> bool {
        self.config.load().enabled
    }

    pub fn check(&self, user_id: &str, role: &str, path: &str) -> RateLimitOutcome {
        let config = self.config.load();
        if !config.enabled || config.bypass_roles.iter().any(|r| r == role) {
            return RateLimitOutcome::Bypassed;
        }

        let category = EndpointCategory::classify(path, &config);
        let limit = limit_for(&config, category, role);
        let key = penalty_key(user_id, category);
        let now = Instant::now();

        if let Some(penalty) = self.lock_penalties().get(&key) {
            if penalty.locked_until > now {
                return RateLimitOutcome::Limited {
                    status: RateLimitStatus { limit, remaining: 0 },
                    retry_after: penalty.locked_until - now,
                    penalty_level: Some(penalty.level),
                };
            }
        }

        match self.window.try_acquire(&key, limit, USER_WINDOW) {
            WindowDecision::Admitted { remaining } => {
                RateLimitOutcome::Allowed(RateLimitStatus { limit, remaining })
            }
            WindowDecision::Rejected { .. } => {
                let (level, lock) = self.escalate(&key, now);
                tracing::warn!(
                    user_id = %user_id,
                    category = category.as_str(),
                    level,
                    lock_secs = lock.as_secs(),
                    "User rate limit exceeded, penalty applied"
                );
                RateLimitOutcome::Limited {
                    status: RateLimitStatus { limit, remaining: 0 },
                    retry_after: lock,
                    penalty_level: Some(level),
                }
            }
        }
    }

    /// Current escalation level for a user and category, 0 when clean.
    pub fn penalty_level(&self, user_id: &str, category: EndpointCategory) -> u32 {
        self.lock_penalties()
            .get(&penalty_key(user_id, category))
            .map_or(0, |p| p.level)
    }

    pub fn tracked_keys(&self) -> usize {
        self.window.len()
    }

    pub fn active_penalties(&self) -> usize {
        let now = Instant::now();
        self.lock_penalties()
            .values()
            .filter(|p| p.locked_until > now)
            .count()
    }

    fn escalate(&self, key: &str, now: Instant) -> (u32, Duration) {
        let mut penalties = self.lock_penalties();
        let penalty = penalties.entry(key.to_string()).or_insert(PenaltyState {
            level: 0,
            locked_until: now,
        });
        if now >= penalty.locked_until + USER_WINDOW {
            penalty.level = 0;
        }
        penalty.level += 1;
        let lock = self.ladder.duration_for(penalty.level);
        penalty.locked_until = now + lock;
        (penalty.level, lock)
    }

    fn lock_penalties(&self) -> std::sync::MutexGuard<'_, HashMap<String, PenaltyState>> {
        self.penalties.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sweep for UserRateLimiter {
    fn name(&self) -> &'static str {
        "user_rate_limit"
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = self.window.sweep(USER_WINDOW);
        let mut penalties = self.lock_penalties();
        let before = penalties.len();
        penalties.retain(|_, p| p.locked_until + USER_WINDOW > now);
        removed += before - penalties.len();
        removed
    }
}

fn limit_for(config: &UserRateLimitConfig, category: EndpointCategory, role: &str) -> u32 {
    match category {
        EndpointCategory::Auth => config.auth,
        EndpointCategory::Upload => config.upload,
        EndpointCategory::Api => config.api,
        EndpointCategory::Admin if config.elevated_roles.iter().any(|r| r == role) => {
            config.admin_elevated
        }
        EndpointCategory::Admin => config.admin,
    }
}

fn penalty_key(user_id: &str, category: EndpointCategory) -> String {
    format!("{user_id}:{}", category.as_str())
}
