use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectConfig;

/// Capped exponential backoff with equal jitter.
///
/// Attempt `n` waits `min(base * 2^n, max)`; with jitter the wait is drawn
/// uniformly from the upper half of that range.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: bool,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: bool) -> Self {
        Self { base, max: max.max(base), jitter, attempt: 0 }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_secs(config.base_delay_secs),
            Duration::from_secs(config.max_delay_secs),
            config.jitter,
        )
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(16));
        let capped = self.base.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        if !self.jitter || capped.is_zero() {
            return capped;
        }
        let half = capped / 2;
        let spread = (capped - half).as_millis() as u64;
        half + Duration::from_millis(rand::rng().random_range(0..=spread))
    }
}
