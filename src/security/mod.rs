//! Security subsystem: admission limiters.
//!
//! # Data Flow
//! ```text
//! Generic middleware chain:
//!     → ip_limit.rs   (per source IP, auth subtree stricter)
//!     → user_limit.rs (per user + category, penalty ladder)
//!
//! Invoked directly by flows:
//!     → otp.rs        (OTP send: phone schedule + IP flood guard)
//!     → lockout.rs    (login: progressive account lock)
//!     → webhook.rs    (callbacks: whitelist + fixed window)
//!
//! Shared pieces:
//!     → window.rs     (sliding window counter)
//!     → penalty.rs    (escalation ladders)
//!     → headers.rs    (outcomes, X-RateLimit-* headers)
//! ```
//!
//! # Design Decisions
//! - Every limiter owns its state behind one mutex; no I/O while it is held
//! - Rejected requests never consume a slot
//! - Each limiter implements `Sweep`; the periodic sweep bounds key space

pub mod headers;
pub mod ip_limit;
pub mod lockout;
pub mod otp;
pub mod penalty;
pub mod user_limit;
pub mod webhook;
pub mod window;

pub use headers::{RateLimitOutcome, RateLimitStatus};
pub use ip_limit::IpRateLimiter;
pub use lockout::{AccountLockout, LockStatus};
pub use otp::OtpRateLimiter;
pub use user_limit::{EndpointCategory, UserRateLimiter};
pub use webhook::WebhookLimiter;

/// True when `path` is `prefix` or lies below it on a segment boundary.
pub(crate) fn path_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::path_under;

    #[test]
    fn test_path_under() {
        assert!(path_under("/api/auth", "/api/auth"));
        assert!(path_under("/api/auth/login", "/api/auth"));
        assert!(path_under("/api/auth/login", "/api/auth/"));
        assert!(!path_under("/api/authority", "/api/auth"));
        assert!(!path_under("/api", "/api/auth"));
    }
}
