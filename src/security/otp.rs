//! OTP send limiter: per-phone progressive delay plus a per-IP flood guard.
//!
//! Phone schedule, measured from the first request of the cycle:
//!
//! | request | requirement            |
//! |---------|------------------------|
//! | 1st     | none                   |
//! | 2nd     | ≥ 1 min                |
//! | 3rd     | ≥ 5 min                |
//! | 4th     | ≥ 10 min               |
//! | 5th     | rejected, 1 hour lock  |
//!
//! A request that fails its wait is not counted. The IP quota is only spent
//! by requests the phone schedule admits.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::OtpConfig;
use crate::error::{GuardError, GuardResult};
use crate::lifecycle::sweeper::Sweep;

/// Minimum time since the first request for the 2nd, 3rd and 4th request.
const PHONE_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(60),
    Duration::from_secs(300),
    Duration::from_secs(600),
];

/// Lock applied when the schedule is exhausted.
pub const PHONE_LOCK: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
struct PhoneRecord {
    count: u32,
    first_request: Instant,
    last_request: Instant,
    locked_until: Option<Instant>,
}

impl PhoneRecord {
    fn fresh(now: Instant) -> Self {
        Self {
            count: 1,
            first_request: now,
            last_request: now,
            locked_until: None,
        }
    }

    /// Wait still required before the next request is admitted.
    fn pending_wait(&self, now: Instant) -> Duration {
        if let Some(until) = self.locked_until {
            return until.saturating_duration_since(now);
        }
        match PHONE_SCHEDULE.get(self.count.saturating_sub(1) as usize) {
            Some(required) => required.saturating_sub(now - self.first_request),
            None => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IpWindow {
    count: u32,
    started: Instant,
}

#[derive(Default)]
struct OtpState {
    phones: HashMap<String, PhoneRecord>,
    ips: HashMap<IpAddr, IpWindow>,
}

pub struct OtpRateLimiter {
    ip_max_requests: u32,
    ip_window: Duration,
    state: Mutex<OtpState>,
}

impl OtpRateLimiter {
    pub fn new(config: &OtpConfig) -> Self {
        Self {
            ip_max_requests: config.ip_max_requests,
            ip_window: Duration::from_secs(config.ip_window_secs),
            state: Mutex::new(OtpState::default()),
        }
    }

    /// Admit an OTP send for `phone` from `ip`, or report how long to wait.
    pub fn check(&self, phone: &str, ip: IpAddr) -> GuardResult<()> {
        let now = Instant::now();
        let mut guard = self.lock_state();
        let state = &mut *guard;

        let ip_window = state
            .ips
            .get(&ip)
            .copied()
            .filter(|w| now - w.started < self.ip_window);
        if let Some(window) = ip_window {
            if window.count >= self.ip_max_requests {
                let wait = (window.started + self.ip_window) - now;
                tracing::warn!(ip = %ip, wait_secs = wait.as_secs(), "OTP IP quota exhausted");
                return Err(GuardError::RateLimited(wait));
            }
        }

        match state.phones.get_mut(phone) {
            Some(record) if record.locked_until.is_some_and(|until| until > now) => {
                let wait = record.pending_wait(now);
                return Err(GuardError::RateLimited(wait));
            }
            Some(record) if record.locked_until.is_none() => {
                record.count += 1;
                if record.count > PHONE_SCHEDULE.len() as u32 + 1 {
                    record.locked_until = Some(now + PHONE_LOCK);
                    record.last_request = now;
                    tracing::warn!(phone = %phone, "OTP schedule exhausted, phone locked");
                    return Err(GuardError::RateLimited(PHONE_LOCK));
                }
                let required = PHONE_SCHEDULE[(record.count - 2) as usize];
                let elapsed = now - record.first_request;
                if elapsed < required {
                    record.count -= 1;
                    return Err(GuardError::RateLimited(required - elapsed));
                }
                record.last_request = now;
            }
            // New phone, or a lock that has run out: start a new cycle.
            _ => {
                state.phones.insert(phone.to_string(), PhoneRecord::fresh(now));
            }
        }

        let window = ip_window.unwrap_or(IpWindow {
            count: 0,
            started: now,
        });
        state.ips.insert(
            ip,
            IpWindow {
                count: window.count + 1,
                started: window.started,
            },
        );
        Ok(())
    }

    /// Seconds until `phone` may request again. Never mutates state.
    pub fn retry_after_seconds(&self, phone: &str) -> u64 {
        let now = Instant::now();
        let state = self.lock_state();
        let wait = state
            .phones
            .get(phone)
            .map_or(Duration::ZERO, |record| record.pending_wait(now));
        ceil_secs(wait)
    }

    /// Clear a phone's record after a successful verification.
    pub fn reset(&self, phone: &str) {
        self.lock_state().phones.remove(phone);
    }

    pub fn tracked_phones(&self) -> usize {
        self.lock_state().phones.len()
    }

    pub fn tracked_ips(&self) -> usize {
        self.lock_state().ips.len()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, OtpState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sweep for OtpRateLimiter {
    fn name(&self) -> &'static str {
        "otp"
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock_state();
        let before = state.phones.len() + state.ips.len();
        state.phones.retain(|_, record| match record.locked_until {
            Some(until) => until > now,
            None => now - record.last_request < PHONE_LOCK,
        });
        let ip_window = self.ip_window;
        state.ips.retain(|_, window| now - window.started < ip_window);
        before - (state.phones.len() + state.ips.len())
    }
}

fn ceil_secs(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONE: &str = "55512345";

    fn limiter() -> OtpRateLimiter {
        OtpRateLimiter::new(&OtpConfig::default())
    }

    fn ip(n: u8) -> IpAddr {
        IpAddr::from([192, 0, 2, n])
    }

    fn wait_of(result: GuardResult<()>) -> Duration {
        match result {
            Err(GuardError::RateLimited(wait)) => wait,
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    async fn advance_secs(secs: u64) {
        tokio::time::advance(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_phone_schedule_and_lock() {
        let limiter = limiter();

        limiter.check(PHONE, ip(1)).unwrap();

        advance_secs(20).await;
        assert_eq!(wait_of(limiter.check(PHONE, ip(2))), Duration::from_secs(40));

        advance_secs(40).await;
        limiter.check(PHONE, ip(3)).unwrap();

        advance_secs(240).await;
        limiter.check(PHONE, ip(4)).unwrap();

        advance_secs(300).await;
        limiter.check(PHONE, ip(5)).unwrap();

        // 5th request locks for exactly one hour.
        assert_eq!(wait_of(limiter.check(PHONE, ip(6))), PHONE_LOCK);

        advance_secs(1000).await;
        assert_eq!(wait_of(limiter.check(PHONE, ip(7))), Duration::from_secs(2600));

        advance_secs(2600).await;
        limiter.check(PHONE, ip(8)).unwrap();
        // New cycle: the 2nd request again needs a minute.
        assert_eq!(wait_of(limiter.check(PHONE, ip(9))), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_wait_is_not_counted() {
        let limiter = limiter();
        limiter.check(PHONE, ip(1)).unwrap();
        for _ in 0..10 {
            assert!(limiter.check(PHONE, ip(1)).is_err());
        }
        advance_secs(60).await;
        // Still the 2nd request, not the 12th.
        limiter.check(PHONE, ip(1)).unwrap();
        assert_eq!(limiter.retry_after_seconds(PHONE), 240);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ip_flood_guard() {
        let limiter = limiter();
        let source = ip(50);
        for n in 0..5 {
            limiter.check(&format!("phone-{n}"), source).unwrap();
        }
        advance_secs(100).await;
        assert_eq!(
            wait_of(limiter.check("phone-new", source)),
            Duration::from_secs(1700)
        );

        advance_secs(1700).await;
        limiter.check("phone-new", source).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_phone_rejection_does_not_spend_ip_quota() {
        let limiter = limiter();
        let source = ip(60);
        limiter.check(PHONE, source).unwrap();
        for _ in 0..10 {
            assert!(limiter.check(PHONE, source).is_err());
        }
        for n in 0..4 {
            limiter.check(&format!("other-{n}"), source).unwrap();
        }
        assert!(limiter.check("one-too-many", source).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_seconds_is_read_only() {
        let limiter = limiter();
        assert_eq!(limiter.retry_after_seconds(PHONE), 0);

        limiter.check(PHONE, ip(1)).unwrap();
        advance_secs(15).await;
        for _ in 0..5 {
            assert_eq!(limiter.retry_after_seconds(PHONE), 45);
        }
        advance_secs(45).await;
        assert_eq!(limiter.retry_after_seconds(PHONE), 0);
        limiter.check(PHONE, ip(1)).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_starts_new_cycle() {
        let limiter = limiter();
        limiter.check(PHONE, ip(1)).unwrap();
        limiter.reset(PHONE);
        limiter.check(PHONE, ip(1)).unwrap();
        assert_eq!(limiter.retry_after_seconds(PHONE), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_idle_records() {
        let limiter = limiter();
        limiter.check(PHONE, ip(1)).unwrap();
        advance_secs(1800).await;
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_ips(), 0);
        assert_eq!(limiter.tracked_phones(), 1);

        advance_secs(1800).await;
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_phones(), 0);
    }
}
