//! Per-IP rate limiting for anonymous traffic.
//!
//! Two categories share one sliding window map: the auth subtree gets its own
//! key (`ip:auth:<addr>`) and a stricter limit. There is no escalation at
//! this layer; a limited IP recovers as soon as its oldest event ages out.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::IpRateLimitConfig;
use crate::lifecycle::sweeper::Sweep;
use crate::security::headers::{RateLimitOutcome, RateLimitStatus};
use crate::security::path_under;
use crate::security::window::{SlidingWindow, WindowDecision};

pub struct IpRateLimiter {
    config: ArcSwap<IpRateLimitConfig>,
    window: SlidingWindow,
}

impl IpRateLimiter {
    pub fn new(config: IpRateLimitConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            window: SlidingWindow::new(),
        }
    }

    /// Swap in new limits. Existing windows are kept.
    pub fn reconfigure(&self, config: IpRateLimitConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn is_enabled(&self) -> bool {
        self.config.load().enabled
    }

    /// Count a request from `ip` to `path` against its category window.
    pub fn check(&self, ip: IpAddr, path: &str) -> RateLimitOutcome {
        let config = self.config.load();
        if !config.enabled {
            return RateLimitOutcome::Bypassed;
        }

        let (key, limit) = if path_under(path, &config.auth_path_prefix) {
            (format!("ip:auth:{ip}"), config.auth_requests_per_window)
        } else {
            (format!("ip:{ip}"), config.requests_per_window)
        };
        let window = Duration::from_secs(config.window_secs);

        match self.window.try_acquire(&key, limit, window) {
            WindowDecision::Admitted { remaining } => {
                RateLimitOutcome::Allowed(RateLimitStatus { limit, remaining })
            }
            WindowDecision::Rejected { retry_after } => RateLimitOutcome::Limited {
                status: RateLimitStatus { limit, remaining: 0 },
                retry_after,
                penalty_level: None,
            },
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.window.len()
    }
}

impl Sweep for IpRateLimiter {
    fn name(&self) -> &'static str {
        "ip_rate_limit"
    }

    fn sweep(&self) -> usize {
        let window = Duration::from_secs(self.config.load().window_secs);
        self.window.sweep(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(general: u32, auth: u32) -> IpRateLimiter {
        IpRateLimiter::new(IpRateLimitConfig {
            requests_per_window: general,
            auth_requests_per_window: auth,
            ..IpRateLimitConfig::default()
        })
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_subtree_has_its_own_limit() {
        let limiter = limiter(5, 2);
        let client = ip("203.0.113.7");

        assert!(!limiter.check(client, "/api/auth/login").is_limited());
        assert!(!limiter.check(client, "/api/auth/otp/send").is_limited());
        assert!(limiter.check(client, "/api/auth/login").is_limited());

        // General traffic is counted separately.
        assert_eq!(
            limiter.check(client, "/api/products"),
            RateLimitOutcome::Allowed(RateLimitStatus { limit: 5, remaining: 4 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_without_escalation() {
        let limiter = limiter(1, 1);
        let client = ip("198.51.100.1");
        limiter.check(client, "/");
        tokio::time::advance(Duration::from_secs(15)).await;

        let outcome = limiter.check(client, "/");
        assert_eq!(outcome.retry_after(), Some(Duration::from_secs(45)));
        assert_eq!(outcome.status(), Some(RateLimitStatus { limit: 1, remaining: 0 }));

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(!limiter.check(client, "/").is_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefix_is_matched_on_segment_boundary() {
        let limiter = limiter(3, 1);
        let client = ip("198.51.100.2");
        limiter.check(client, "/api/auth");
        assert!(limiter.check(client, "/api/auth/").is_limited());
        assert!(!limiter.check(client, "/api/authority").is_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_and_disable() {
        let limiter = limiter(1, 1);
        let client = ip("198.51.100.3");
        limiter.check(client, "/");
        assert!(limiter.check(client, "/").is_limited());

        limiter.reconfigure(IpRateLimitConfig {
            requests_per_window: 10,
            ..IpRateLimitConfig::default()
        });
        assert!(!limiter.check(client, "/").is_limited());

        limiter.reconfigure(IpRateLimitConfig {
            enabled: false,
            ..IpRateLimitConfig::default()
        });
        assert_eq!(limiter.check(client, "/"), RateLimitOutcome::Bypassed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_bounds_key_space() {
        let limiter = limiter(10, 10);
        for n in 0..20u8 {
            limiter.check(IpAddr::from([10, 0, 0, n]), "/");
        }
        assert_eq!(limiter.tracked_keys(), 20);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.sweep(), 20);
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
