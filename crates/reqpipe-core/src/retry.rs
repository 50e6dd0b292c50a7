//! Retry policy with backoff and the per-key attempt ledger.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Backoff strategy applied between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Fixed delay between retries.
    Fixed {
        delay: Duration,
    },
    /// Exponential delay: `base * (factor ^ attempt)`, capped at `max`,
    /// optionally with +/- 50% random jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(3),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before the given retry attempt (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped = seconds.min(max.as_secs_f64());
                let mut delay = Duration::from_secs_f64(capped);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms = delay.as_millis() as i64 + (offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Automatic retry policy.
///
/// Eligible failures are network errors and 5xx responses; see
/// [`crate::ApiError::is_retryable`]. Total attempts = `max_retries + 1`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Per-key retry attempt counter.
///
/// Entries are cleared on the first success for the key, so a long-lived
/// client does not accumulate stale counters.
#[derive(Debug, Default)]
pub struct RetryLedger {
    attempts: Mutex<HashMap<String, u32>>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a retryable failure and return the cumulative attempt count.
    pub fn record_failure(&self, key: &str) -> u32 {
        let mut attempts = self
            .attempts
            .lock()
            .expect("retry ledger lock is not poisoned");
        let count = attempts.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn attempts(&self, key: &str) -> u32 {
        self.attempts
            .lock()
            .expect("retry ledger lock is not poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn clear(&self, key: &str) {
        self.attempts
            .lock()
            .expect("retry ledger lock is not poisoned")
            .remove(key);
    }

    pub fn clear_all(&self) {
        self.attempts
            .lock()
            .expect("retry ledger lock is not poisoned")
            .clear();
    }

    pub fn len(&self) -> usize {
        self.attempts
            .lock()
            .expect("retry ledger lock is not poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(7), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..20 {
            for attempt in 0..5 {
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);
                let delay_ms = backoff.delay(attempt).as_millis() as f64;
                assert!(delay_ms >= expected * 0.49, "delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "delay_ms={delay_ms}");
            }
        }
    }

    #[test]
    fn default_config_retries_three_times() {
        let config = RetryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn no_retry_disables_policy() {
        let config = RetryConfig::no_retry();
        assert!(!config.enabled);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn ledger_counts_and_clears_per_key() {
        let ledger = RetryLedger::new();

        assert_eq!(ledger.record_failure("GET /users"), 1);
        assert_eq!(ledger.record_failure("GET /users"), 2);
        assert_eq!(ledger.attempts("GET /users"), 2);
        assert_eq!(ledger.attempts("GET /orders"), 0);

        ledger.clear("GET /users");
        assert_eq!(ledger.attempts("GET /users"), 0);
        assert!(ledger.is_empty());
    }
}
