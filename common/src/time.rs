// Timing utilities for latency measurement
//
// Two clocks are used by the harness:
// - a monotonic clock (`now_nanos`) for intervals such as report gating
// - the wall clock (`wall_clock_nanos`) for receive timestamps, because the
//   sender embeds its own wall-clock transmit time in every message

use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Global anchor point for converting Instant to nanoseconds
static EPOCH: OnceLock<Instant> = OnceLock::new();

fn get_epoch() -> &'static Instant {
    EPOCH.get_or_init(Instant::now)
}

/// Nanosecond-precision timestamp type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Nanos(pub u64);

impl Nanos {
    pub const ZERO: Nanos = Nanos(0);

    /// Get the raw nanosecond value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Nanoseconds elapsed between `earlier` and `self`, zero if `earlier` is later
    #[inline]
    pub const fn saturating_since(self, earlier: Nanos) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for Nanos {
    type Output = Nanos;

    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Nanos(self.0.saturating_add(rhs))
    }
}

impl From<Duration> for Nanos {
    #[inline]
    fn from(value: Duration) -> Self {
        Self(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
    }
}

/// Get current time in nanoseconds since an arbitrary process-local epoch.
/// Monotonic; use for intervals only.
#[inline]
pub fn now_nanos() -> Nanos {
    let epoch = get_epoch();
    let elapsed = Instant::now().duration_since(*epoch);
    Nanos(elapsed.as_nanos() as u64)
}

/// Wall-clock nanoseconds since the Unix epoch (CLOCK_REALTIME).
///
/// Comparable with the transmit timestamps that feed publishers embed, as long
/// as both hosts keep their clocks synchronized. A clock set before 1970
/// reads as zero.
#[inline]
pub fn wall_clock_nanos() -> Nanos {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => Nanos::from(since_epoch),
        Err(_) => Nanos::ZERO,
    }
}
