//! Cumulative latency statistics.
//!
//! [`LatencyAccumulator`] is owned by exactly one receive loop and updated once
//! per valid message. It is never reset: every [`ReportSnapshot`] taken from it
//! covers the whole run so far.

use crate::time::Nanos;
use std::fmt;

/// Running totals over every accepted message.
#[derive(Debug, Clone, Default)]
pub struct LatencyAccumulator {
    count: u64,
    bytes: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl LatencyAccumulator {
    #[inline]
    pub const fn new() -> Self {
        Self {
            count: 0,
            bytes: 0,
            sum: 0,
            min: 0,
            max: 0,
        }
    }

    /// Record one message of `length` bytes observed with `latency_nanos`.
    ///
    /// The first sample seeds both min and max. Later samples replace them
    /// only when strictly lower / strictly higher. Byte and latency totals
    /// saturate rather than wrap.
    #[inline]
    pub fn record(&mut self, length: usize, latency_nanos: u64) {
        self.count += 1;
        self.bytes = self.bytes.saturating_add(length as u64);
        self.sum = self.sum.saturating_add(latency_nanos);

        if self.count == 1 {
            self.min = latency_nanos;
            self.max = latency_nanos;
        } else {
            if latency_nanos < self.min {
                self.min = latency_nanos;
            }
            if latency_nanos > self.max {
                self.max = latency_nanos;
            }
        }
    }

    #[inline]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    #[inline]
    pub const fn sum(&self) -> u64 {
        self.sum
    }

    /// Smallest latency seen, `None` before the first sample.
    #[inline]
    pub const fn min(&self) -> Option<u64> {
        if self.count == 0 {
            None
        } else {
            Some(self.min)
        }
    }

    /// Largest latency seen, `None` before the first sample.
    #[inline]
    pub const fn max(&self) -> Option<u64> {
        if self.count == 0 {
            None
        } else {
            Some(self.max)
        }
    }

    /// Mean latency in nanoseconds; 0.0 when nothing was recorded.
    #[inline]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Copy of the current totals.
    #[inline]
    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            packet_count: self.count,
            byte_count: self.bytes,
            latency_sum_ns: self.sum,
            avg_latency_ns: self.mean(),
            min_latency_ns: self.min(),
            max_latency_ns: self.max(),
        }
    }
}

/// Immutable copy of a [`LatencyAccumulator`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencySnapshot {
    pub packet_count: u64,
    pub byte_count: u64,
    pub latency_sum_ns: u64,
    pub avg_latency_ns: f64,
    pub min_latency_ns: Option<u64>,
    pub max_latency_ns: Option<u64>,
}

impl LatencySnapshot {
    #[inline]
    pub fn avg_latency_us(&self) -> f64 {
        self.avg_latency_ns / 1_000.0
    }

    #[inline]
    pub fn min_latency_us(&self) -> Option<f64> {
        self.min_latency_ns.map(|ns| ns as f64 / 1_000.0)
    }

    #[inline]
    pub fn max_latency_us(&self) -> Option<f64> {
        self.max_latency_ns.map(|ns| ns as f64 / 1_000.0)
    }
}

/// One-line summary in microseconds, used for lifecycle log lines.
impl fmt::Display for LatencySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "avg {:.2} us", self.avg_latency_us())?;
        if let (Some(min), Some(max)) = (self.min_latency_us(), self.max_latency_us()) {
            write!(f, ", min {:.2} us, max {:.2} us", min, max)?;
        }
        write!(f, " over {} frames", self.packet_count)
    }
}

/// Why a report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Emitted because the report interval elapsed
    Periodic,
    /// Emitted once while draining
    Final,
}

/// A cumulative snapshot stamped with the time it was generated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSnapshot {
    pub kind: ReportKind,
    pub generated_at: Nanos,
    pub stats: LatencySnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accumulator() {
        let acc = LatencyAccumulator::new();
        assert_eq!(acc.count(), 0);
        assert_eq!(acc.bytes(), 0);
        assert_eq!(acc.mean(), 0.0);
        assert_eq!(acc.min(), None);
        assert_eq!(acc.max(), None);

        let snap = acc.snapshot();
        assert_eq!(snap.avg_latency_ns, 0.0);
        assert_eq!(snap.min_latency_us(), None);
    }

    #[test]
    fn test_snapshot_summary_line() {
        let mut acc = LatencyAccumulator::new();
        assert_eq!(acc.snapshot().to_string(), "avg 0.00 us over 0 frames");

        acc.record(40, 100);
        acc.record(40, 300);
        assert_eq!(
            acc.snapshot().to_string(),
            "avg 0.20 us, min 0.10 us, max 0.30 us over 2 frames"
        );
    }

    #[test]
    fn test_first_sample_seeds_min_and_max() {
        let mut acc = LatencyAccumulator::new();
        acc.record(40, 700);
        assert_eq!(acc.min(), Some(700));
        assert_eq!(acc.max(), Some(700));
    }

    #[test]
    fn test_three_samples() {
        let mut acc = LatencyAccumulator::new();
        for latency in [50, 10, 90] {
            acc.record(40, latency);
        }

        let snap = acc.snapshot();
        assert_eq!(snap.packet_count, 3);
        assert_eq!(snap.byte_count, 120);
        assert_eq!(snap.latency_sum_ns, 150);
        assert_eq!(snap.min_latency_ns, Some(10));
        assert_eq!(snap.max_latency_ns, Some(90));
        assert_eq!(snap.avg_latency_ns, 50.0);
    }

    #[test]
    fn test_zero_latency_sample_lowers_min() {
        let mut acc = LatencyAccumulator::new();
        acc.record(32, 5);
        acc.record(32, 0);
        assert_eq!(acc.min(), Some(0));
        assert_eq!(acc.max(), Some(5));
    }

    #[test]
    fn test_totals_saturate() {
        let mut acc = LatencyAccumulator::new();
        acc.record(32, u64::MAX - 1);
        acc.record(32, 10);
        assert_eq!(acc.sum(), u64::MAX);
        assert_eq!(acc.max(), Some(u64::MAX - 1));
        assert_eq!(acc.min(), Some(10));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut acc = LatencyAccumulator::new();
        acc.record(40, 100);
        let before = acc.snapshot();
        acc.record(40, 300);

        assert_eq!(before.packet_count, 1);
        assert_eq!(acc.snapshot().packet_count, 2);
    }

    #[test]
    fn test_microsecond_conversion() {
        let mut acc = LatencyAccumulator::new();
        acc.record(40, 1_500);
        acc.record(40, 2_500);
        let snap = acc.snapshot();
        assert_eq!(snap.avg_latency_us(), 2.0);
        assert_eq!(snap.min_latency_us(), Some(1.5));
        assert_eq!(snap.max_latency_us(), Some(2.5));
    }
}
