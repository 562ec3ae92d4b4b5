//! Randomized timing and jitter used to make synthetic input look human
//!
//! Every delay, dwell time and spatial offset in the bot goes through one
//! [`Humanizer`]. Gaussian draws honor the given mean and standard deviation
//! as-is; only the delay helpers clamp the result to a floor so a long tail
//! never produces a zero or negative sleep.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Minimum delay returned by [`Humanizer::delay`], in milliseconds
pub const DELAY_FLOOR_MS: f64 = 50.0;

/// Minimum delay returned by [`Humanizer::small_delay`], in milliseconds
pub const SMALL_DELAY_FLOOR_MS: f64 = 1.0;

/// Shared source of humanized randomness
pub struct Humanizer {
    rng: Mutex<StdRng>,
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Humanizer {
    /// Create a humanizer seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a humanizer with a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn gaussian(&self, mean: f64, stddev: f64) -> f64 {
        let z: f64 = self.rng.lock().sample(StandardNormal);
        mean + z * stddev
    }

    /// Gaussian delay in milliseconds, never shorter than 50ms
    pub fn delay(&self, mean_ms: f64, stddev_ms: f64) -> Duration {
        let ms = self.gaussian(mean_ms, stddev_ms).max(DELAY_FLOOR_MS);
        Duration::from_millis(ms as u64)
    }

    /// Gaussian delay for fine-grained motion pacing, never shorter than 1ms
    pub fn small_delay(&self, mean_ms: f64, stddev_ms: f64) -> Duration {
        let ms = self.gaussian(mean_ms, stddev_ms).max(SMALL_DELAY_FLOOR_MS);
        Duration::from_millis(ms as u64)
    }

    /// Unclamped Gaussian integer, truncated toward zero
    pub fn jitter_int(&self, mean: i32, stddev: i32) -> i32 {
        self.gaussian(mean as f64, stddev as f64) as i32
    }

    /// Uniform integer in `[min, max]`; returns `min` when the range is empty
    pub fn uniform_int(&self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.rng.lock().gen_range(min..=max)
    }

    /// Uniform float in `[min, max)`
    pub fn uniform_float(&self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.rng.lock().gen_range(min..max)
    }

    /// True with probability `p`
    pub fn bernoulli(&self, p: f64) -> bool {
        self.rng.lock().gen::<f64>() < p
    }
}
