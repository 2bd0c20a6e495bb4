//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::ListenerConfig;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Jitter: 0 to 10% of the delay
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Retry schedule for rebinding the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebindPolicy {
    pub attempts: u32,
    pub base_ms: u64,
    pub max_ms: u64,
}

impl RebindPolicy {
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self {
            attempts: config.rebind_attempts.max(1),
            base_ms: config.rebind_base_delay_ms,
            max_ms: config.rebind_max_delay_ms,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_ms, self.max_ms)
    }
}

impl Default for RebindPolicy {
    fn default() -> Self {
        Self::from_config(&ListenerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);
    }

    #[test]
    fn policy_always_allows_one_attempt() {
        let config = ListenerConfig {
            rebind_attempts: 0,
            ..ListenerConfig::default()
        };
        assert_eq!(RebindPolicy::from_config(&config).attempts, 1);
        assert_eq!(RebindPolicy::default().delay(0), Duration::ZERO);
    }
}
