//! Limiter outcomes and the rate-limit response headers.
//!
//! `X-RateLimit-Limit` / `X-RateLimit-Remaining` are written on every
//! limited request, admitted or not. `Retry-After` is added by the
//! rejection response itself (see `GuardError`).

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Quota state reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
}

/// Result of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    /// The caller is exempt; no headers are written.
    Bypassed,
    Allowed(RateLimitStatus),
    Limited {
        status: RateLimitStatus,
        retry_after: Duration,
        /// Escalation level for limiters with a penalty ladder.
        penalty_level: Option<u32>,
    },
}

impl RateLimitOutcome {
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited { .. })
    }

    pub fn status(&self) -> Option<RateLimitStatus> {
        match self {
            Self::Bypassed => None,
            Self::Allowed(status) | Self::Limited { status, .. } => Some(*status),
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Limited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Write the limit/remaining headers for `status`.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, status: RateLimitStatus) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(status.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
}
