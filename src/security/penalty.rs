//! Escalating lock durations.

use std::time::Duration;

/// Lock durations for repeated user rate-limit violations.
pub const USER_PENALTY_LADDER: EscalationLadder = EscalationLadder::new(&[60, 300, 900, 1800]);

/// Lock durations for consecutive failed logins.
pub const LOGIN_LOCKOUT_LADDER: EscalationLadder = EscalationLadder::new(&[60, 300, 900, 1800]);

/// A table of durations indexed by violation level (1-based).
/// Levels past the end stay on the last step.
#[derive(Debug, Clone, Copy)]
pub struct EscalationLadder {
    steps: &'static [u64],
}

impl EscalationLadder {
    pub const fn new(steps: &'static [u64]) -> Self {
        Self { steps }
    }

    /// Duration for the `level`-th violation. Level 0 is treated as level 1.
    pub fn duration_for(&self, level: u32) -> Duration {
        let Some(last) = self.steps.last() else {
            return Duration::ZERO;
        };
        let index = (level.max(1) - 1) as usize;
        Duration::from_secs(*self.steps.get(index).unwrap_or(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_ladder_steps() {
        let secs: Vec<u64> = (1..=5)
            .map(|level| USER_PENALTY_LADDER.duration_for(level).as_secs())
            .collect();
        assert_eq!(secs, vec![60, 300, 900, 1800, 1800]);
    }

    #[test]
    fn test_login_ladder_caps() {
        assert_eq!(LOGIN_LOCKOUT_LADDER.duration_for(0), Duration::from_secs(60));
        assert_eq!(LOGIN_LOCKOUT_LADDER.duration_for(4), Duration::from_secs(1800));
        assert_eq!(LOGIN_LOCKOUT_LADDER.duration_for(40), Duration::from_secs(1800));
    }
}
