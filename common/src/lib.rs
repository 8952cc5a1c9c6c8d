//! Shared building blocks for the multicast latency harness: clocks, frame
//! storage, the background logger, sockets and the market data wire format.

pub mod frame_pool;
pub mod lf_queue;
pub mod logging;
pub mod net;
pub mod stats;
pub mod time;
pub mod wire;

pub use frame_pool::{FramePool, FrameSlot, FRAME_CAPACITY};
pub use stats::{LatencyAccumulator, LatencySnapshot, ReportKind, ReportSnapshot};
pub use time::Nanos;
