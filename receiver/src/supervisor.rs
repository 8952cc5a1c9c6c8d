//! The receive loop and its lifecycle.
//!
//! ```text
//! Initializing ──open ok──▶ Running ──cancel / source error──▶ Draining ──▶ Terminated
//!       └──────────open failed──────────────────────────────────────────────▲
//! ```
//!
//! Each iteration of the running loop checks the cancellation token once,
//! acquires from the source, pushes every frame through
//! parse → extract → accumulate, releases it, and lets the reporter decide
//! whether a periodic report is due. The blocking and burst variants differ
//! only in how frames are acquired.
//!
//! The time spent on each frame, from hand-off by the source until it is
//! released, is kept in a second accumulator and logged once at drain.

use crate::cancel::CancellationToken;
use crate::config::SupervisorConfig;
use crate::error::{SourceError, StartupError};
use crate::extract::TimestampExtractor;
use crate::parser::FrameParser;
use crate::reporter::{PeriodicReporter, ReportSink};
use crate::source::{BlockingSource, BurstSource, PacketSource, RawFrame};
use common::logging::LogLevel;
use common::stats::{LatencyAccumulator, ReportSnapshot};
use common::time::now_nanos;

/// Lifecycle state of a receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Initializing,
    Running,
    Draining,
    Terminated,
}

/// Frame accounting for one receive loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Frames handed out by the source.
    pub frames_acquired: u64,
    /// Frames that produced no latency sample (unrelated traffic or short messages).
    pub messages_discarded: u64,
    /// Burst polls that returned nothing.
    pub empty_polls: u64,
    /// Periodic reports emitted.
    pub periodic_reports: u64,
}

/// How a receive loop ended.
#[derive(Debug)]
pub enum Termination {
    /// Drained after cancellation.
    Cancelled { report: ReportSnapshot },
    /// Drained after the source failed.
    SourceFailed {
        report: ReportSnapshot,
        error: SourceError,
    },
    /// The source never opened; no frames were received.
    StartupFailed(StartupError),
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Cancelled { .. })
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// The final cumulative report, if the loop ever ran.
    pub fn final_report(&self) -> Option<&ReportSnapshot> {
        match self {
            Termination::Cancelled { report } | Termination::SourceFailed { report, .. } => {
                Some(report)
            }
            Termination::StartupFailed(_) => None,
        }
    }
}

/// Owns the statistics of one receive loop and drives it to termination.
///
/// A supervisor runs once; start a new one for another run.
pub struct Supervisor {
    config: SupervisorConfig,
    cancel: CancellationToken,
    stats: LatencyAccumulator,
    /// Per-frame processing time in ns, parse through release
    processing: LatencyAccumulator,
    reporter: PeriodicReporter,
    extractor: TimestampExtractor,
    counters: SupervisorStats,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, cancel: CancellationToken) -> Self {
        let reporter = PeriodicReporter::new(config.report_interval, now_nanos());
        Self {
            config,
            cancel,
            stats: LatencyAccumulator::new(),
            processing: LatencyAccumulator::new(),
            reporter,
            extractor: TimestampExtractor,
            counters: SupervisorStats::default(),
            state: SupervisorState::Initializing,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn stats(&self) -> &LatencyAccumulator {
        &self.stats
    }

    /// Processing time of every acquired frame, discarded ones included.
    pub fn processing(&self) -> &LatencyAccumulator {
        &self.processing
    }

    pub fn counters(&self) -> &SupervisorStats {
        &self.counters
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Open a one-frame-per-call source and receive until cancelled or the
    /// source fails.
    pub fn run_blocking<S, F, R>(&mut self, open: F, sink: &mut R) -> Termination
    where
        S: BlockingSource,
        F: FnOnce() -> Result<S, StartupError>,
        R: ReportSink + ?Sized,
    {
        let mut source = match self.initialize(open, sink) {
            Ok(source) => source,
            Err(termination) => return termination,
        };
        let parser = source.parser();

        let failure = loop {
            if self.cancel.is_cancelled() {
                break None;
            }

            match source.acquire() {
                Ok(Some(frame)) => self.process(&mut source, &parser, frame),
                // Cancelled while waiting; seen at the top of the next iteration
                Ok(None) => {}
                Err(e) => break Some(e),
            }

            self.poll_reporter(sink);
        };

        self.drain(&mut source, failure, sink)
    }

    /// Open a batch-polling source and receive until cancelled or the source
    /// fails. Up to `burst_size` frames are processed per iteration.
    pub fn run_burst<S, F, R>(&mut self, open: F, sink: &mut R) -> Termination
    where
        S: BurstSource,
        F: FnOnce() -> Result<S, StartupError>,
        R: ReportSink + ?Sized,
    {
        let burst_size = self.config.burst_size;
        if burst_size == 0 && self.state == SupervisorState::Initializing {
            let error = StartupError::InvalidConfig("burst size must be greater than 0".to_string());
            return self.startup_failed(error, sink);
        }

        let mut source = match self.initialize(open, sink) {
            Ok(source) => source,
            Err(termination) => return termination,
        };
        let parser = source.parser();
        let mut burst: Vec<RawFrame> = Vec::with_capacity(burst_size);

        let failure = loop {
            if self.cancel.is_cancelled() {
                break None;
            }

            let result = source.acquire_batch(burst_size, &mut burst);
            if burst.is_empty() {
                self.counters.empty_polls += 1;
            }
            // Frames delivered before a failure are still processed and released
            for frame in burst.drain(..) {
                self.process(&mut source, &parser, frame);
            }
            if let Err(e) = result {
                break Some(e);
            }

            self.poll_reporter(sink);
        };

        self.drain(&mut source, failure, sink)
    }

    fn initialize<S, F, R>(&mut self, open: F, sink: &mut R) -> Result<S, Termination>
    where
        S: PacketSource,
        F: FnOnce() -> Result<S, StartupError>,
        R: ReportSink + ?Sized,
    {
        if self.state != SupervisorState::Initializing {
            let error = StartupError::InvalidConfig("supervisor has already run".to_string());
            return Err(self.startup_failed(error, sink));
        }

        match open() {
            Ok(source) => {
                self.state = SupervisorState::Running;
                self.reporter = PeriodicReporter::new(self.config.report_interval, now_nanos());
                sink.event(LogLevel::Info, "Receive loop running", None);
                Ok(source)
            }
            Err(error) => Err(self.startup_failed(error, sink)),
        }
    }

    fn startup_failed<R: ReportSink + ?Sized>(&mut self, error: StartupError, sink: &mut R) -> Termination {
        sink.event(LogLevel::Error, "Startup failed", Some(&error));
        self.state = SupervisorState::Terminated;
        Termination::StartupFailed(error)
    }

    #[inline]
    fn process<S: PacketSource + ?Sized>(&mut self, source: &mut S, parser: &FrameParser, frame: RawFrame) {
        let started = now_nanos();
        self.counters.frames_acquired += 1;
        let len = frame.len();

        let bytes = source.frame_bytes(&frame);
        let latency = parser
            .parse(bytes)
            .and_then(|message| self.extractor.latency(message.payload(bytes), frame.received_at()));

        match latency {
            Some(latency) => self.stats.record(len, latency),
            None => self.counters.messages_discarded += 1,
        }

        source.release(frame);
        self.processing.record(len, now_nanos().saturating_since(started));
    }

    #[inline]
    fn poll_reporter<R: ReportSink + ?Sized>(&mut self, sink: &mut R) {
        if self.reporter.poll(now_nanos(), &self.stats, sink) {
            self.counters.periodic_reports += 1;
        }
    }

    fn drain<S, R>(&mut self, source: &mut S, failure: Option<SourceError>, sink: &mut R) -> Termination
    where
        S: PacketSource + ?Sized,
        R: ReportSink + ?Sized,
    {
        self.state = SupervisorState::Draining;
        match &failure {
            None => sink.event(LogLevel::Info, "Cancellation requested, draining", None),
            Some(error) => sink.event(LogLevel::Error, "Source failed, draining", Some(error)),
        }

        source.close();
        let report = self.reporter.finish(now_nanos(), &self.stats, sink);
        if self.processing.count() > 0 {
            let processing = self.processing.snapshot();
            sink.event(LogLevel::Info, "Processing time per frame", Some(&processing));
        }

        let outstanding = source.frames_outstanding();
        if outstanding != 0 {
            sink.event(LogLevel::Warn, "Frames never released", Some(&outstanding));
        }
        sink.event(LogLevel::Debug, "Frames acquired", Some(&self.counters.frames_acquired));
        sink.event(LogLevel::Debug, "Messages discarded", Some(&self.counters.messages_discarded));

        self.state = SupervisorState::Terminated;
        sink.event(LogLevel::Info, "Receive loop terminated", None);

        match failure {
            None => Termination::Cancelled { report },
            Some(error) => Termination::SourceFailed { report, error },
        }
    }
}
