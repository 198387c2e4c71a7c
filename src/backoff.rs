//! Recovery timeouts of an open circuit.
//!
//! The first `fixed_interval_retries` circuit breaks wait a flat `base_interval_minutes`. Every
//! further break multiplies the wait by `base_interval_minutes` again, up to
//! `max_exponential_retries` steps:
//!
//! ```text
//! base = 5, fixed = 3, max = 5
//!
//! breaks:   0   1   2   3   4    5     6    ..  8+
//! minutes:  5   5   5   5   25   125   625  ..  15625
//! ```
//!
//! Optional jitter spreads the result by up to ±10% (at least ±1 minute).

use std::fmt::{self, Display};

use rand::Rng;

/// Hybrid fixed/exponential recovery timeout calculator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HybridBackoff {
    /// The flat recovery wait, and the growth factor of the exponential phase.
    pub base_interval_minutes: u64,
    /// Number of circuit breaks that wait the flat base interval.
    pub fixed_interval_retries: u32,
    /// Cap on the number of exponential growth steps.
    pub max_exponential_retries: u32,
    /// Whether to randomize the timeout.
    pub jitter_enabled: bool,
}

/// Which part of the backoff schedule a breaker is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryPhase {
    /// No circuit break since the last recovery.
    Closed,
    /// Flat waits. `attempt` never exceeds `of`.
    FixedInterval {
        /// Current circuit break.
        attempt: u32,
        /// Configured number of fixed interval retries.
        of: u32,
    },
    /// Growing waits. `attempt` is capped at `of`.
    ExponentialInterval {
        /// Current exponential step.
        attempt: u32,
        /// Configured maximum of exponential steps.
        of: u32,
    },
}

impl Default for HybridBackoff {
    fn default() -> Self {
        HybridBackoff {
            base_interval_minutes: 5,
            fixed_interval_retries: 3,
            max_exponential_retries: 5,
            jitter_enabled: true,
        }
    }
}

impl HybridBackoff {
    /// Returns the phase of the schedule for the given number of consecutive circuit breaks.
    pub fn phase(&self, consecutive_breaks: u32) -> RetryPhase {
        if consecutive_breaks == 0 {
            RetryPhase::Closed
        } else if consecutive_breaks <= self.fixed_interval_retries {
            RetryPhase::FixedInterval {
                attempt: consecutive_breaks,
                of: self.fixed_interval_retries,
            }
        } else {
            RetryPhase::ExponentialInterval {
                attempt: self.exponential_attempt(consecutive_breaks),
                of: self.max_exponential_retries,
            }
        }
    }

    /// The recovery timeout in minutes without jitter.
    pub fn base_timeout_minutes(&self, consecutive_breaks: u32) -> u64 {
        let base = self.base_interval_minutes;
        match self.phase(consecutive_breaks) {
            RetryPhase::Closed | RetryPhase::FixedInterval { .. } => base,
            RetryPhase::ExponentialInterval { attempt, .. } => {
                base.saturating_mul(base.saturating_pow(attempt))
            }
        }
    }

    /// The recovery timeout in minutes, jittered when enabled.
    pub fn timeout_minutes<R: Rng>(&self, consecutive_breaks: u32, rng: &mut R) -> u64 {
        let timeout = self.base_timeout_minutes(consecutive_breaks);
        if self.jitter_enabled {
            jitter(timeout, rng)
        } else {
            timeout
        }
    }

    fn exponential_attempt(&self, consecutive_breaks: u32) -> u32 {
        (consecutive_breaks - self.fixed_interval_retries).min(self.max_exponential_retries)
    }
}

/// Moves `timeout` by a uniform offset in `[-spread, spread]`, `spread = max(1, ceil(timeout / 10))`.
///
/// The result is at least one minute. A zero timeout stays zero.
fn jitter<R: Rng>(timeout: u64, rng: &mut R) -> u64 {
    if timeout == 0 {
        return 0;
    }

    let spread = (timeout / 10 + u64::from(timeout % 10 != 0)).max(1);
    let offset = i128::from(rng.gen_range(0..=2 * spread)) - i128::from(spread);
    let jittered = i128::from(timeout) + offset;

    jittered.clamp(1, i128::from(u64::MAX)) as u64
}

impl Display for RetryPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RetryPhase::Closed => write!(f, "closed"),
            RetryPhase::FixedInterval { attempt, of } => {
                write!(f, "fixed-interval (attempt {}/{})", attempt, of)
            }
            RetryPhase::ExponentialInterval { attempt, of } => {
                write!(f, "exponential-interval (attempt {}/{})", attempt, of)
            }
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RetryPhase {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
