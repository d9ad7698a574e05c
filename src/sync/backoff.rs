use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry schedule for the companion link while the face is visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Fraction of the delay added or removed at random, 0.0..=1.0.
    pub jitter: f64,
    /// Consecutive failures after which the session gives up until the next
    /// visibility change. `None` retries for as long as the face stays
    /// visible.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: Some(5),
        }
    }
}

impl ReconnectPolicy {
    /// Never retries; the next visibility change is the only retry.
    pub fn host_driven() -> Self {
        Self {
            max_attempts: Some(0),
            ..Self::default()
        }
    }

    /// Delay before retrying after `failures` consecutive failures, or `None`
    /// once `failures` reaches `max_attempts`.
    pub fn delay_for(&self, failures: u32, rng: &mut impl Rng) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if failures >= max {
                return None;
            }
        }

        let exponent = failures.saturating_sub(1).min(32) as i32;
        let base = (self.initial_delay_ms as f64) * self.multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_delay_ms as f64);

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rng.gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };

        Some(Duration::from_millis((capped * factor).round().max(0.0) as u64))
    }
}
