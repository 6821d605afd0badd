//! Monotonic deadlines for blocking waits.

use std::time::{Duration, Instant};

/// A point in time after which a blocking wait must give up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Total budget this deadline was created with.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Time elapsed since the deadline was started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Whether the budget has been used up.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Convert fractional seconds from configuration into a `Duration`.
///
/// # Errors
///
/// Returns a description when `secs` is negative, not finite, or too large
/// to be represented.
pub fn secs_f64(secs: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{secs} seconds: {e}"))
}
