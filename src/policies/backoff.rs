//! Backoff policy for flapping programs.
//!
//! [`BackoffPolicy`] controls how the retry delay grows after consecutive
//! failed start attempts, and when the supervisor stops trying altogether.
//! It is parameterized by:
//! - [`BackoffPolicy::base`] the delay before the first retry;
//! - [`BackoffPolicy::max`] the cap on any single delay;
//! - [`BackoffPolicy::max_attempts`] the attempt budget before giving up.
//!
//! The delay for attempt `n` (0-indexed) is `base × 2^n`, clamped to `max`,
//! then jitter is applied. The base delay is derived purely from the attempt
//! number, so jitter output never feeds back into later calculations.
//!
//! The attempt counter itself lives in the supervisor; this type is a pure
//! computation over it. The counter resets when a program stays up past its
//! settle window, or when a client explicitly issues Start/Restart.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use chayd::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     base: Duration::from_secs(1),
//!     max: Duration::from_secs(30),
//!     max_attempts: 6,
//!     jitter: JitterPolicy::None,
//! };
//!
//! // 1s, 2s, 4s, 8s, 16s, then capped at 30s
//! assert_eq!(backoff.delay(0), Duration::from_secs(1));
//! assert_eq!(backoff.delay(4), Duration::from_secs(16));
//! assert_eq!(backoff.delay(5), Duration::from_secs(30));
//! assert_eq!(backoff.delay(6), Duration::from_secs(30));
//!
//! assert!(!backoff.exhausted(5));
//! assert!(backoff.exhausted(6));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Capped exponential backoff with an attempt budget.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Cap on any single retry delay.
    pub max: Duration,
    /// Consecutive failures tolerated before the program is parked in `Exited`.
    pub max_attempts: u32,
    /// Jitter applied to the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `base = 1s`, `max = 30s`, `max_attempts = 4`, bounded ±20% jitter.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: 4,
            jitter: JitterPolicy::default(),
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// The base delay is `base × 2^attempt`, clamped to [`BackoffPolicy::max`].
    /// Overflow (huge attempt numbers) clamps to `max` as well.
    pub fn delay(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped = self.base.as_secs_f64() * 2f64.powi(exp);

        let base = if !unclamped.is_finite() || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };
        self.jitter.apply(base)
    }

    /// True once the attempt budget is consumed.
    ///
    /// `exhausted` flips exactly at `attempt == max_attempts`.
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
