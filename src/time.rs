//! Time
//!
//! The adaptation layer never reads a clock. Callers pass the current `Instant` to every operation
//! that needs it, which makes the layer usable with simulated time.

use core::{fmt, ops, time::Duration};

/// Absolute time, in milliseconds since an arbitrary epoch
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Instant {
    millis: u64,
}

impl Instant {
    /// The epoch
    pub const ZERO: Instant = Instant { millis: 0 };

    /// Creates an `Instant` from a number of milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Instant { millis }
    }

    /// Creates an `Instant` from a number of seconds
    pub const fn from_secs(secs: u64) -> Self {
        Instant {
            millis: secs * 1_000,
        }
    }

    /// Total number of milliseconds since the epoch
    pub const fn total_millis(&self) -> u64 {
        self.millis
    }

    /// Time elapsed since `earlier`; zero if `earlier` is in the future
    pub fn saturating_duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(earlier.millis))
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        let millis = rhs
            .as_secs()
            .saturating_mul(1_000)
            .saturating_add(u64::from(rhs.subsec_millis()));

        Instant {
            millis: self.millis.saturating_add(millis),
        }
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.millis / 1_000, self.millis % 1_000)
    }
}
