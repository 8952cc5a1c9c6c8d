// Low-latency logger
//
// Receive loops must not format strings or perform I/O. Log entries are pushed
// onto an SPSC queue and formatted by a background writer thread:
// 1. Lock-free hand-off via `lf_queue::channel`
// 2. Lazy formatting on the writer thread, including latency reports
// 3. A full queue drops the entry instead of blocking the producer, except
//    for final reports, which wait for room
//
// The queue is single-producer, so each receive loop owns its own Logger.

use crate::lf_queue::{self, Consumer, Producer};
use crate::stats::{ReportKind, ReportSnapshot};
use crate::time::{now_nanos, Nanos};

use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const QUEUE_CAPACITY: usize = 4096;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log payloads. Everything except `Formatted` is allocation-free to create.
pub enum LogMessage {
    Static(&'static str),
    StaticWithU64(&'static str, u64),
    /// Pre-formatted text, for cold paths only
    Formatted(String),
    /// A latency report, rendered in microseconds by the writer thread
    Report(ReportSnapshot),
}

impl LogMessage {
    #[inline]
    fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            LogMessage::Static(s) => write!(writer, "{}", s),
            LogMessage::StaticWithU64(s, v) => write!(writer, "{}: {}", s, v),
            LogMessage::Formatted(s) => write!(writer, "{}", s),
            LogMessage::Report(report) => write_report(writer, report),
        }
    }
}

fn write_micros<W: Write + ?Sized>(writer: &mut W, value: Option<f64>) -> std::io::Result<()> {
    match value {
        Some(us) => write!(writer, "{:.2} us", us),
        None => write!(writer, "n/a"),
    }
}

fn write_report<W: Write + ?Sized>(writer: &mut W, report: &ReportSnapshot) -> std::io::Result<()> {
    let stats = &report.stats;
    match report.kind {
        ReportKind::Periodic => {
            write!(
                writer,
                "Packets: {}, Avg Latency: {:.2} us, Min: ",
                stats.packet_count,
                stats.avg_latency_us()
            )?;
            write_micros(writer, stats.min_latency_us())?;
            write!(writer, ", Max: ")?;
            write_micros(writer, stats.max_latency_us())
        }
        ReportKind::Final => {
            writeln!(writer, "=== Final Statistics ===")?;
            writeln!(writer, "  Total Packets:     {}", stats.packet_count)?;
            write!(writer, "  Total Bytes:       {}", stats.byte_count)?;
            if stats.packet_count > 0 {
                write!(writer, "\n  Average Latency:   {:.2} us", stats.avg_latency_us())?;
                write!(writer, "\n  Min Latency:       ")?;
                write_micros(writer, stats.min_latency_us())?;
                write!(writer, "\n  Max Latency:       ")?;
                write_micros(writer, stats.max_latency_us())?;
            }
            Ok(())
        }
    }
}

/// A single log entry
pub struct LogEntry {
    pub timestamp: Nanos,
    pub level: LogLevel,
    pub message: LogMessage,
}

/// Shared state between Logger and background thread
struct LoggerShared {
    running: AtomicBool,
    flush_requested: AtomicBool,
    flush_complete: AtomicBool,
}

/// Logger that offloads formatting and I/O to a background thread
///
/// # Example
/// ```ignore
/// let logger = Logger::with_level(LogLevel::Info);
/// logger.log(LogLevel::Info, "Receiver started");
/// logger.log_with_u64(LogLevel::Debug, "Burst size", 32);
/// logger.flush();
/// ```
pub struct Logger {
    producer: Producer<LogEntry, QUEUE_CAPACITY>,
    shared: Arc<LoggerShared>,
    writer_thread: Option<JoinHandle<()>>,
    min_level: LogLevel,
    dropped: Cell<u64>,
}

impl Logger {
    /// Logger writing every level to stderr
    pub fn new() -> Self {
        Self::with_level(LogLevel::Debug)
    }

    /// Logger writing to stderr, filtered at `min_level`
    pub fn with_level(min_level: LogLevel) -> Self {
        Self::with_writer(min_level, None, std::io::stderr())
    }

    /// Logger writing to an arbitrary sink. `label` prefixes every line,
    /// which tells per-core instances apart.
    pub fn with_writer<W>(min_level: LogLevel, label: Option<String>, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (producer, consumer) = lf_queue::channel();
        let shared = Arc::new(LoggerShared {
            running: AtomicBool::new(true),
            flush_requested: AtomicBool::new(false),
            flush_complete: AtomicBool::new(false),
        });

        let shared_clone = Arc::clone(&shared);
        let writer_thread = thread::spawn(move || {
            Self::writer_loop(shared_clone, consumer, label, writer);
        });

        Self {
            producer,
            shared,
            writer_thread: Some(writer_thread),
            min_level,
            dropped: Cell::new(0),
        }
    }

    fn writer_loop<W: Write>(
        shared: Arc<LoggerShared>,
        queue: Consumer<LogEntry, QUEUE_CAPACITY>,
        label: Option<String>,
        mut writer: W,
    ) {
        let label = label.as_deref();
        let mut idle_count = 0u32;

        while shared.running.load(Ordering::Acquire) {
            let mut processed = 0;

            while let Some(entry) = queue.pop() {
                Self::write_entry(&mut writer, label, &entry);
                processed += 1;
            }

            if shared.flush_requested.load(Ordering::Acquire) {
                // Entries pushed before the request are visible now
                while let Some(entry) = queue.pop() {
                    Self::write_entry(&mut writer, label, &entry);
                }
                let _ = writer.flush();
                shared.flush_requested.store(false, Ordering::Release);
                shared.flush_complete.store(true, Ordering::Release);
            }

            if processed > 0 {
                idle_count = 0;
            } else {
                idle_count = idle_count.saturating_add(1);

                // Spin, then yield, then sleep while idle
                if idle_count < 100 {
                    std::hint::spin_loop();
                } else if idle_count < 1100 {
                    thread::yield_now();
                } else {
                    thread::sleep(std::time::Duration::from_micros(100));
                }
            }
        }

        while let Some(entry) = queue.pop() {
            Self::write_entry(&mut writer, label, &entry);
        }
        let _ = writer.flush();
    }

    /// Format: [timestamp_ns] LEVEL [label] message
    #[inline]
    fn write_entry<W: Write>(writer: &mut W, label: Option<&str>, entry: &LogEntry) {
        let _ = write!(
            writer,
            "[{:016}] {:5} ",
            entry.timestamp.as_u64(),
            entry.level.as_str()
        );
        if let Some(label) = label {
            let _ = write!(writer, "[{}] ", label);
        }
        let _ = entry.message.write_to(writer);
        let _ = writeln!(writer);
    }

    #[inline]
    fn entry(level: LogLevel, message: LogMessage) -> LogEntry {
        LogEntry {
            timestamp: now_nanos(),
            level,
            message,
        }
    }

    #[inline]
    fn enqueue(&self, level: LogLevel, message: LogMessage) {
        if level < self.min_level {
            return;
        }

        if self.producer.push(Self::entry(level, message)).is_err() {
            self.dropped.set(self.dropped.get() + 1);
        }
    }

    /// Waits for room instead of dropping. Gives up only if the writer thread
    /// is gone.
    fn enqueue_blocking(&self, level: LogLevel, message: LogMessage) {
        let mut entry = Self::entry(level, message);
        while let Err(back) = self.producer.push(entry) {
            let writer_alive = self
                .writer_thread
                .as_ref()
                .is_some_and(|handle| !handle.is_finished());
            if !writer_alive {
                self.dropped.set(self.dropped.get() + 1);
                return;
            }
            entry = back;
            thread::yield_now();
        }
    }

    /// Log a static message
    #[inline]
    pub fn log(&self, level: LogLevel, msg: &'static str) {
        self.enqueue(level, LogMessage::Static(msg));
    }

    /// Log a static message with a u64 value, formatted on the writer thread
    #[inline]
    pub fn log_with_u64(&self, level: LogLevel, msg: &'static str, value: u64) {
        self.enqueue(level, LogMessage::StaticWithU64(msg, value));
    }

    /// Log a message with any Display value. Formats on the caller's thread,
    /// so keep it off the receive path.
    #[inline]
    pub fn log_with_value<T: std::fmt::Display>(&self, level: LogLevel, msg: &'static str, value: T) {
        if level < self.min_level {
            return;
        }
        self.enqueue(level, LogMessage::Formatted(format!("{}: {}", msg, value)));
    }

    /// Log a latency report at Info level. Periodic reports are dropped on
    /// a full queue like any other entry; a final report waits for room and
    /// is written regardless of the level filter.
    #[inline]
    pub fn log_report(&self, report: ReportSnapshot) {
        match report.kind {
            ReportKind::Periodic => self.enqueue(LogLevel::Info, LogMessage::Report(report)),
            ReportKind::Final => self.enqueue_blocking(LogLevel::Info, LogMessage::Report(report)),
        }
    }

    /// Block until every entry queued so far has been written and the sink flushed
    pub fn flush(&self) {
        self.shared.flush_complete.store(false, Ordering::Release);
        self.shared.flush_requested.store(true, Ordering::Release);

        while !self.shared.flush_complete.load(Ordering::Acquire) {
            thread::yield_now();
        }
    }

    #[inline]
    pub fn queue_len(&self) -> usize {
        self.producer.len()
    }

    /// Entries lost to a full queue since the logger was created
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.min_level
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);

        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
    }
}
