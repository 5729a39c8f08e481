//! Sliding-window request counter.
//!
//! Each key holds the timestamps of its admitted events. A window check
//! prunes entries older than the window, then counts what is left.
//! Rejected attempts are never recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Outcome of an admission check against a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    /// Admitted; `remaining` slots are left in the current window.
    Admitted { remaining: u32 },
    /// Rejected; the oldest recorded event leaves the window in `retry_after`.
    Rejected { retry_after: Duration },
}

/// Keyed sliding-window counter.
#[derive(Debug, Default)]
pub struct SlidingWindow {
    events: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit and record an event for `key` if fewer than `limit` events fall inside `window`.
    pub fn try_acquire(&self, key: &str, limit: u32, window: Duration) -> WindowDecision {
        let now = Instant::now();
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let timestamps = events.entry(key.to_string()).or_default();
        prune(timestamps, now, window);

        if timestamps.len() >= limit as usize {
            let retry_after = timestamps
                .front()
                .map(|oldest| (*oldest + window).saturating_duration_since(now))
                .unwrap_or(window);
            return WindowDecision::Rejected {
                retry_after: retry_after.max(Duration::from_secs(1)),
            };
        }

        timestamps.push_back(now);
        WindowDecision::Admitted {
            remaining: limit.saturating_sub(timestamps.len() as u32),
        }
    }

    /// Events for `key` still inside `window`, without recording one.
    pub fn count(&self, key: &str, window: Duration) -> usize {
        let now = Instant::now();
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        match events.get_mut(key) {
            Some(timestamps) => {
                prune(timestamps, now, window);
                timestamps.len()
            }
            None => 0,
        }
    }

    /// Forget every event recorded for `key`.
    pub fn clear(&self, key: &str) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Prune every key against `window` and drop the ones left empty.
    /// Returns the number of keys removed.
    pub fn sweep(&self, window: Duration) -> usize {
        let now = Instant::now();
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let before = events.len();
        events.retain(|_, timestamps| {
            prune(timestamps, now, window);
            !timestamps.is_empty()
        });
        before - events.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.saturating_duration_since(*oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
