//! Synthetic order book feed for latency benchmarking.
//!
//! Publishes [`OrderBookUpdate`] messages to a multicast group at a fixed
//! rate. Each message carries its wall-clock send time in the first eight
//! bytes, which is what the receiver measures against.

use common::net::multicast::MulticastSocket;
use common::time::{now_nanos, wall_clock_nanos, Nanos};
use common::wire::OrderBookUpdate;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Mid price of the first quote, in cents.
pub const BASE_PRICE_CENTS: u32 = 10_000;

/// Half of the quoted spread, in cents.
pub const HALF_SPREAD_CENTS: u32 = 5;

/// Remaining wait below which the pacer spins instead of sleeping.
const SPIN_THRESHOLD_NS: u64 = 50_000;

/// Configuration for the feed publisher.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Multicast group address
    pub group: Ipv4Addr,
    /// Destination port
    pub port: u16,
    /// Outgoing interface address (0.0.0.0 lets the kernel choose)
    pub interface: Ipv4Addr,
    /// Multicast time-to-live
    pub ttl: u32,
    /// Symbol stamped into every message
    pub symbol: String,
    /// Messages per second
    pub rate: u64,
    /// How long to publish for
    pub duration: Duration,
    /// Deliver to receivers on this host as well
    pub loopback: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            group: Ipv4Addr::new(239, 1, 1, 1),
            port: 12345,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 2,
            symbol: "AAPL".to_string(),
            rate: 10_000,
            duration: Duration::from_secs(60),
            loopback: true,
        }
    }
}

impl FeedConfig {
    pub fn new(group: Ipv4Addr, port: u16) -> Self {
        Self {
            group,
            port,
            ..Default::default()
        }
    }

    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_rate(mut self, rate: u64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }
}

/// Quote for message number `sequence`.
///
/// The mid price walks up one cent per message and wraps every 100 messages;
/// sizes cycle through 1000..1500.
pub fn quote(symbol: &str, sequence: u32, timestamp_ns: u64) -> OrderBookUpdate {
    let mid = BASE_PRICE_CENTS + sequence % 100;
    OrderBookUpdate::new(
        timestamp_ns,
        symbol,
        mid - HALF_SPREAD_CENTS,
        1000 + sequence % 500,
        mid + HALF_SPREAD_CENTS,
        1000 + sequence.wrapping_add(1) % 500,
        sequence,
    )
}

/// Groups for running several feeds side by side: `base`, `base + 1`, ...
pub fn feed_groups(base: Ipv4Addr, count: usize) -> Vec<Ipv4Addr> {
    let base = u32::from(base);
    (0..count as u32)
        .map(|i| Ipv4Addr::from(base.wrapping_add(i)))
        .collect()
}

/// Fixed-rate send schedule.
///
/// Deadlines are absolute, so time spent sending does not accumulate as drift.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval_ns: u64,
    next_deadline: Nanos,
}

impl Pacer {
    /// `rate` messages per second, the first send due one interval after
    /// `start`. A rate of zero sends as fast as possible.
    pub fn new(rate: u64, start: Nanos) -> Self {
        let interval_ns = if rate == 0 { 0 } else { 1_000_000_000 / rate };
        Self {
            interval_ns,
            next_deadline: start + interval_ns,
        }
    }

    pub fn interval_ns(&self) -> u64 {
        self.interval_ns
    }

    /// Time to wait at `now` before the next send, and advance the schedule.
    pub fn next_wait(&mut self, now: Nanos) -> u64 {
        let wait = self.next_deadline.saturating_since(now);
        // Running late: resume from now rather than bursting to catch up
        let base = if wait == 0 { now } else { self.next_deadline };
        self.next_deadline = base + self.interval_ns;
        wait
    }

    /// Block until the next send is due.
    pub fn wait(&mut self) {
        let wait = self.next_wait(now_nanos());
        if wait == 0 {
            return;
        }

        let deadline = now_nanos() + wait;
        if wait > SPIN_THRESHOLD_NS {
            thread::sleep(Duration::from_nanos(wait - SPIN_THRESHOLD_NS));
        }
        while now_nanos() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// Publisher statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub messages_sent: u64,
    pub bytes_sent: u64,
}

impl FeedStats {
    /// Average send rate over `elapsed`.
    pub fn rate(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.messages_sent as f64 / secs
        } else {
            0.0
        }
    }
}

/// Sends order book updates to a multicast group.
pub struct FeedPublisher {
    socket: MulticastSocket,
    config: FeedConfig,
    sequence: u32,
    stats: FeedStats,
}

impl FeedPublisher {
    pub fn new(config: FeedConfig) -> io::Result<Self> {
        if !config.group.is_multicast() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a multicast address", config.group),
            ));
        }

        let socket = MulticastSocket::new()?;
        socket.set_multicast_ttl(config.ttl)?;
        socket.set_multicast_loop(config.loopback)?;
        if !config.interface.is_unspecified() {
            socket.set_multicast_interface(config.interface)?;
        }

        Ok(Self {
            socket,
            config,
            sequence: 0,
            stats: FeedStats::default(),
        })
    }

    /// Send the next update, stamped with the current wall-clock time.
    pub fn publish_next(&mut self) -> io::Result<usize> {
        let update = quote(&self.config.symbol, self.sequence, wall_clock_nanos().as_u64());
        let sent = self
            .socket
            .send_to(update.as_bytes(), self.config.group, self.config.port)?;

        self.sequence = self.sequence.wrapping_add(1);
        self.stats.messages_sent += 1;
        self.stats.bytes_sent += sent as u64;
        Ok(sent)
    }

    /// Publish at the configured rate until the duration elapses or `running`
    /// is cleared. `on_progress` is called after every `rate` messages, i.e.
    /// roughly once per second.
    pub fn run<F>(&mut self, running: &AtomicBool, mut on_progress: F) -> io::Result<Duration>
    where
        F: FnMut(&FeedStats, Duration),
    {
        let start = now_nanos();
        let duration_ns = Nanos::from(self.config.duration).as_u64();
        let progress_every = self.config.rate.max(1);
        let mut pacer = Pacer::new(self.config.rate, start);

        while running.load(Ordering::SeqCst) && now_nanos().saturating_since(start) < duration_ns {
            self.publish_next()?;

            if self.stats.messages_sent % progress_every == 0 {
                on_progress(&self.stats, Duration::from_nanos(now_nanos().saturating_since(start)));
            }

            pacer.wait();
        }

        Ok(Duration::from_nanos(now_nanos().saturating_since(start)))
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}
