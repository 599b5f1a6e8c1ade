//! Reconnection policy with exponential backoff

use rand::Rng;
use std::time::Duration;

/// Configuration for automatic reconnection after an unexpected disconnect
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt
    pub base_delay: Duration,
    /// Maximum delay between reconnection attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (2.0 doubles the delay each attempt)
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0), applied as +/- a fraction of the delay
    pub jitter: f64,
    /// Maximum number of consecutive attempts (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Keep retrying when the server rejects the credentials
    ///
    /// Only consulted for reconnection attempts. A rejection on the first
    /// `connect()` is always returned to the caller without a retry.
    pub retry_on_auth_failure: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: None,
            retry_on_auth_failure: false,
        }
    }
}

impl ReconnectConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Set jitter factor
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Set maximum attempts
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Retry after authentication failures too
    pub fn with_retry_on_auth_failure(mut self, retry: bool) -> Self {
        self.retry_on_auth_failure = retry;
        self
    }

    /// Never reconnect automatically
    pub fn disabled() -> Self {
        Self {
            max_attempts: Some(0),
            ..Default::default()
        }
    }

    /// Returns true if automatic reconnection can ever happen
    pub fn is_enabled(&self) -> bool {
        self.max_attempts != Some(0)
    }

    /// Delay before `attempt` (1-indexed), without jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay before `attempt` with jitter applied, never above `max_delay`
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter == 0.0 || base.is_zero() {
            return base;
        }

        let spread = base.as_millis() as f64 * self.jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        let millis = (base.as_millis() as f64 + offset)
            .clamp(0.0, self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// Check if `attempt` (1-indexed) is within budget
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt <= max,
            None => true,
        }
    }
}

/// Consecutive-attempt counter driven by a [`ReconnectConfig`]
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl Backoff {
    /// Start counting from zero
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Policy in use
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Attempts made since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Register another attempt. Returns its number and delay, or `None` once
    /// the budget is exhausted.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        let attempt = self.attempt + 1;
        if !self.config.allows_attempt(attempt) {
            return None;
        }
        self.attempt = attempt;
        Some((attempt, self.config.delay_with_jitter(attempt)))
    }

    /// Forget previous attempts after a successful session
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.multiplier, 2.0);
        assert!(config.max_attempts.is_none());
        assert!(!config.retry_on_auth_failure);
    }

    #[test]
    fn test_delay_calculation() {
        let config = ReconnectConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(0.0);

        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(800));

        // Should cap at max_delay
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = ReconnectConfig::new().with_jitter(0.5);
        for attempt in 1..=8 {
            let base = config.delay_for_attempt(attempt).as_millis() as f64;
            let delay = config.delay_with_jitter(attempt).as_millis() as f64;
            assert!(delay >= base * 0.5 - 1.0, "attempt {}: {} < {}", attempt, delay, base);
            assert!(delay <= (base * 1.5 + 1.0).min(30_000.0));
        }
    }

    #[test]
    fn test_attempt_budget() {
        let unlimited = ReconnectConfig::default();
        assert!(unlimited.allows_attempt(1));
        assert!(unlimited.allows_attempt(1_000));

        let limited = ReconnectConfig::default().with_max_attempts(3);
        assert!(limited.allows_attempt(3));
        assert!(!limited.allows_attempt(4));

        let disabled = ReconnectConfig::disabled();
        assert!(!disabled.is_enabled());
        assert!(!disabled.allows_attempt(1));
    }

    #[test]
    fn test_backoff_counts_and_resets() {
        let mut backoff = Backoff::new(
            ReconnectConfig::new()
                .with_base_delay(Duration::from_millis(10))
                .with_jitter(0.0)
                .with_max_attempts(2),
        );

        assert_eq!(backoff.next_attempt(), Some((1, Duration::from_millis(10))));
        assert_eq!(backoff.next_attempt(), Some((2, Duration::from_millis(20))));
        assert_eq!(backoff.next_attempt(), None);
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.next_attempt(), Some((1, Duration::from_millis(10))));
    }
}
