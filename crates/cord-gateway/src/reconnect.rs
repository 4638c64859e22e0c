//! Reconnection delay policy.

use std::time::Duration;

/// How long to wait before each reconnect attempt.
///
/// The first `escalate_after` consecutive attempts wait `initial_delay`; any
/// attempt beyond that waits `escalated_delay`. The attempt counter lives on
/// the socket and resets whenever a connection opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay for the early attempts.
    pub initial_delay: Duration,
    /// Delay once attempts pass the threshold.
    pub escalated_delay: Duration,
    /// Number of attempts that use the initial delay.
    pub escalate_after: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            escalated_delay: Duration::from_secs(60),
            escalate_after: 100,
        }
    }
}

impl ReconnectConfig {
    /// Set the delay used for early attempts.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay used after the threshold.
    #[must_use]
    pub const fn with_escalated_delay(mut self, delay: Duration) -> Self {
        self.escalated_delay = delay;
        self
    }

    /// Set the attempt threshold.
    #[must_use]
    pub const fn with_escalate_after(mut self, attempts: u32) -> Self {
        self.escalate_after = attempts;
        self
    }

    /// Delay before attempt number `attempt` (1-based).
    #[must_use]
    pub const fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt > self.escalate_after {
            self.escalated_delay
        } else {
            self.initial_delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(3));
        assert_eq!(config.escalated_delay, Duration::from_secs(60));
        assert_eq!(config.escalate_after, 100);
    }

    #[test_case(0, 3 ; "zero attempts")]
    #[test_case(1, 3 ; "first attempt")]
    #[test_case(100, 3 ; "at threshold")]
    #[test_case(101, 60 ; "past threshold")]
    #[test_case(5_000, 60 ; "far past threshold")]
    fn test_delay_for_attempt(attempt: u32, secs: u64) {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(attempt), Duration::from_secs(secs));
    }

    #[test]
    fn test_builders() {
        let config = ReconnectConfig::default()
            .with_initial_delay(Duration::from_millis(10))
            .with_escalated_delay(Duration::from_millis(500))
            .with_escalate_after(2);

        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(10));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(500));
    }
}
