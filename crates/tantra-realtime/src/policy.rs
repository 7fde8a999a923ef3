use std::time::Duration;

use tantra_config::RealtimeConfig;

/// Bounded reconnection with a fixed delay between attempts
///
/// `max_attempts` counts every connection attempt in one cycle, including the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectionPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 1_000,
        }
    }
}

impl ReconnectionPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
        }
    }

    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.reconnection_attempts, config.reconnection_delay_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another attempt is allowed once `attempt` attempts have been made
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_config_defaults() {
        let policy = ReconnectionPolicy::from_config(&RealtimeConfig::default());
        assert_eq!(policy, ReconnectionPolicy::default());
        assert_eq!(policy.delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_should_retry_is_bounded() {
        let policy = ReconnectionPolicy::new(3, 10);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!ReconnectionPolicy::new(0, 10).should_retry(0));
    }
}
