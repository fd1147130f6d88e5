use std::time::Duration;

/// Retry schedule for transient fetch failures: `base * 2^attempt`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
            current_attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.current_attempt);
        self.current_attempt += 1;
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn attempt_count(&self) -> u32 {
        self.current_attempt
    }

    pub fn should_retry(&self) -> bool {
        self.current_attempt < self.max_attempts
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30), 3)
    }
}
