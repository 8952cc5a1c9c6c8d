//! Time-gated latency reports.
//!
//! Reports are cumulative since the receive loop started. The accumulator is
//! never reset between reports.

use common::logging::{LogLevel, Logger};
use common::stats::{LatencyAccumulator, ReportKind, ReportSnapshot};
use common::time::Nanos;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Destination for report snapshots and receive loop lifecycle events.
pub trait ReportSink {
    fn emit(&mut self, report: &ReportSnapshot);

    /// Lifecycle notice. Never called from inside the per-frame path.
    fn event(&mut self, _level: LogLevel, _message: &'static str, _detail: Option<&dyn fmt::Display>) {}
}

/// Reports go to the background logger and are formatted off the receive path.
impl ReportSink for Logger {
    #[inline]
    fn emit(&mut self, report: &ReportSnapshot) {
        self.log_report(*report);
    }

    fn event(&mut self, level: LogLevel, message: &'static str, detail: Option<&dyn fmt::Display>) {
        match detail {
            Some(detail) => self.log_with_value(level, message, detail),
            None => self.log(level, message),
        }
    }
}

/// Collects reports in memory; lifecycle events are dropped.
impl ReportSink for Vec<ReportSnapshot> {
    fn emit(&mut self, report: &ReportSnapshot) {
        self.push(*report);
    }
}

/// Decides when a periodic report is due.
#[derive(Debug, Clone)]
pub struct PeriodicReporter {
    interval_ns: u64,
    last_emission: Nanos,
}

impl PeriodicReporter {
    /// `started_at` is the monotonic time the interval is measured from.
    pub fn new(interval: Duration, started_at: Nanos) -> Self {
        Self {
            interval_ns: Nanos::from(interval).as_u64(),
            last_emission: started_at,
        }
    }

    /// Emit a periodic report if at least one interval has passed since the
    /// previous emission. Returns whether a report was emitted.
    #[inline]
    pub fn poll<S: ReportSink + ?Sized>(
        &mut self,
        now: Nanos,
        stats: &LatencyAccumulator,
        sink: &mut S,
    ) -> bool {
        if now.saturating_since(self.last_emission) < self.interval_ns {
            return false;
        }

        sink.emit(&ReportSnapshot {
            kind: ReportKind::Periodic,
            generated_at: now,
            stats: stats.snapshot(),
        });
        self.last_emission = now;
        true
    }

    /// Unconditional final report.
    pub fn finish<S: ReportSink + ?Sized>(
        &mut self,
        now: Nanos,
        stats: &LatencyAccumulator,
        sink: &mut S,
    ) -> ReportSnapshot {
        let report = ReportSnapshot {
            kind: ReportKind::Final,
            generated_at: now,
            stats: stats.snapshot(),
        };
        sink.emit(&report);
        self.last_emission = now;
        report
    }

    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_ns)
    }

    pub fn last_emission(&self) -> Nanos {
        self.last_emission
    }
}
