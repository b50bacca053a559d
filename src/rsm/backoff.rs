use std::time::Duration;

use crate::config::BackoffConfig;

/// Doubling poll delay, capped at the configured maximum
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            current: config.initial(),
            max: config.max(),
        }
    }

    /// Delay to sleep now; the following call returns twice as much
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        if self.current < self.max {
            self.current = (self.current * 2).min(self.max);
        }
        delay
    }
}
