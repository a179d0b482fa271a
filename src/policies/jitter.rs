//! Jitter policy for retry delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that many programs
//! crashing at once (a dependency went away, a disk filled up) do not retry
//! in lockstep.
//!
//! - [`JitterPolicy::None`] no randomization, predictable delays (tests)
//! - [`JitterPolicy::Bounded`] uniform perturbation in `[1-ratio, 1+ratio]`

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JitterPolicy {
    /// Use the exact computed delay.
    ///
    /// Use when predictable timing is required (single program, tests).
    None,

    /// Scale the delay by a uniformly random factor in `[1-ratio, 1+ratio]`.
    ///
    /// `ratio` is clamped to `[0, 1]`. With the default `ratio = 0.2` a 10s
    /// delay lands anywhere in `[8s, 12s]`.
    Bounded { ratio: f64 },
}

impl Default for JitterPolicy {
    /// Bounded ±20%, which keeps delays recognizable while breaking lockstep.
    fn default() -> Self {
        JitterPolicy::Bounded { ratio: 0.2 }
    }
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Bounded { ratio } => {
                let ratio = ratio.clamp(0.0, 1.0);
                if ratio == 0.0 || delay.is_zero() {
                    return delay;
                }
                let mut rng = rand::rng();
                let factor = rng.random_range((1.0 - ratio)..=(1.0 + ratio));
                delay.mul_f64(factor)
            }
        }
    }
}
