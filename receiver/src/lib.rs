//! Multicast market data latency receiver.
//!
//! Measures one-way latency between a feed publisher and this host by
//! comparing the send timestamp embedded in each message with the local
//! receive time. Two acquisition paths are provided:
//!
//! - **kernel**: a UDP multicast socket, one datagram per blocking call
//! - **bypass**: a link-layer capture socket polled in bursts, with Ethernet,
//!   IPv4 and UDP decoded in user space
//!
//! Both feed the same [`Supervisor`] loop, which accumulates statistics and
//! emits periodic and final reports.

pub mod cancel;
pub mod config;
pub mod error;
pub mod extract;
pub mod parser;
pub mod protocol;
pub mod reporter;
pub mod source;
pub mod supervisor;

pub use cancel::CancellationToken;
pub use config::{BypassSourceConfig, KernelSourceConfig, SupervisorConfig};
pub use error::{SourceError, StartupError};
pub use extract::TimestampExtractor;
pub use parser::{FrameParser, ParsedMessage, UdpFilter};
pub use reporter::{PeriodicReporter, ReportSink};
pub use source::{BlockingSource, BurstSource, PacketSource, RawFrame};
pub use supervisor::{Supervisor, SupervisorState, SupervisorStats, Termination};
