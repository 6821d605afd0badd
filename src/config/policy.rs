//! Timeout-overflow tolerance policy.

use std::time::Duration;

/// Default base timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 5.0;
/// Default maximum overflow timeout in seconds.
pub const DEFAULT_TIMEOUT_MAX_OVERFLOW_SECS: f64 = 7.5;
/// Default number of consecutive overflows tolerated per worker.
pub const DEFAULT_TIMEOUT_OVERFLOWS: u32 = 1;

/// How long a call may take, and how often a worker may run late.
///
/// A reply within `base` resets the serving worker's overflow counter. A reply
/// between `base` and `max_overflow` increments it; once the counter exceeds
/// `tolerance` the reply is discarded and the call times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Nominal time budget for a call.
    pub base: Duration,
    /// Absolute upper bound after which no reply is accepted.
    pub max_overflow: Duration,
    /// Consecutive overflows permitted before a late reply is rejected.
    pub tolerance: u32,
}

impl TimeoutPolicy {
    /// Build a policy, checking that `max_overflow >= base`.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated constraint.
    pub fn new(base: Duration, max_overflow: Duration, tolerance: u32) -> Result<Self, String> {
        let policy = Self {
            base,
            max_overflow,
            tolerance,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Validate policy values.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.base.is_zero() {
            return Err("base timeout must be greater than 0".into());
        }
        if self.max_overflow < self.base {
            return Err(format!(
                "max overflow timeout ({:?}) must be >= base timeout ({:?})",
                self.max_overflow, self.base
            ));
        }
        Ok(())
    }

    /// Whether a call of `elapsed` ran past the base timeout.
    #[must_use]
    pub fn overflowed(&self, elapsed: Duration) -> bool {
        elapsed > self.base
    }

    /// Whether `count` consecutive overflows exceed the tolerance.
    #[must_use]
    pub const fn exhausted(&self, count: u32) -> bool {
        count > self.tolerance
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            max_overflow: Duration::from_secs_f64(DEFAULT_TIMEOUT_MAX_OVERFLOW_SECS),
            tolerance: DEFAULT_TIMEOUT_OVERFLOWS,
        }
    }
}
