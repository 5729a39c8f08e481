//! Inbound callback limiter.

use std::net::IpAddr;
use std::time::Duration;

use ipnetwork::{IpNetwork, IpNetworkError};

use crate::config::WebhookConfig;
use crate::lifecycle::sweeper::Sweep;
use crate::security::headers::{RateLimitOutcome, RateLimitStatus};
use crate::security::window::{SlidingWindow, WindowDecision};

/// Whitelisted callback sources pass untouched; everyone else gets a fixed
/// count per window.
pub struct WebhookLimiter {
    whitelist: Vec<IpNetwork>,
    max_requests: u32,
    window: Duration,
    counter: SlidingWindow,
}

impl WebhookLimiter {
    pub fn new(whitelist: Vec<IpNetwork>, max_requests: u32, window: Duration) -> Self {
        Self {
            whitelist,
            max_requests,
            window,
            counter: SlidingWindow::new(),
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Result<Self, IpNetworkError> {
        let whitelist = config
            .whitelist
            .iter()
            .map(|entry| entry.parse())
            .collect::<Result<Vec<IpNetwork>, _>>()?;
        Ok(Self::new(
            whitelist,
            config.max_requests,
            Duration::from_secs(config.window_secs),
        ))
    }

    pub fn is_whitelisted(&self, ip: IpAddr) -> bool {
        self.whitelist.iter().any(|net| net.contains(ip))
    }

    pub fn check(&self, ip: IpAddr) -> RateLimitOutcome {
        if self.is_whitelisted(ip) {
            return RateLimitOutcome::Bypassed;
        }
        let limit = self.max_requests;
        match self.counter.try_acquire(&ip.to_string(), limit, self.window) {
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
        self.counter.len()
    }
}

impl Sweep for WebhookLimiter {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn sweep(&self) -> usize {
        self.counter.sweep(self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> WebhookLimiter {
        WebhookLimiter::from_config(&WebhookConfig {
            whitelist: vec!["196.201.214.0/24".into(), "10.1.1.1".into()],
            max_requests: 2,
            window_secs: 60,
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitelist_bypasses() {
        let limiter = limiter();
        for _ in 0..100 {
            assert_eq!(
                limiter.check("196.201.214.20".parse().unwrap()),
                RateLimitOutcome::Bypassed
            );
        }
        assert!(limiter.is_whitelisted("10.1.1.1".parse().unwrap()));
        assert!(!limiter.is_whitelisted("10.1.1.2".parse().unwrap()));
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_limit_for_unknown_sources() {
        let limiter = limiter();
        let source: IpAddr = "203.0.113.50".parse().unwrap();
        assert!(!limiter.check(source).is_limited());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!limiter.check(source).is_limited());

        let outcome = limiter.check(source);
        assert_eq!(outcome.retry_after(), Some(Duration::from_secs(50)));
    }

    #[test]
    fn test_bad_whitelist_entry() {
        let config = WebhookConfig {
            whitelist: vec!["not-an-ip".into()],
            ..WebhookConfig::default()
        };
        assert!(WebhookLimiter::from_config(&config).is_err());
    }
}
