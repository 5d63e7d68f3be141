//! Bounded doubling backoff for transient generation failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubles for each one after.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Spread each wait by up to a quarter either way.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1_000)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: MAX_DELAY,
            jitter: true,
        }
    }

    /// No waiting between attempts. Used by tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self { base_delay: Duration::ZERO, jitter: false, ..Self::new(max_retries, 0) }
    }

    /// Wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let doubling = 2u32.saturating_pow(retry - 1);
        let delay = self.base_delay.saturating_mul(doubling).min(self.max_delay);
        if self.jitter {
            delay.mul_f64(1.0 + jitter_fraction())
        } else {
            delay
        }
    }

    pub fn should_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }
}

/// Pseudo-random value in [-0.25, 0.25) from a splitmix64 sequence.
fn jitter_fraction() -> f64 {
    static STATE: AtomicU64 = AtomicU64::new(0x2545_f491_4f6c_dd1d);
    let mut z = STATE.fetch_add(0x9e37_79b9_7f4a_7c15, Ordering::Relaxed);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64 * 0.5 - 0.25
}
