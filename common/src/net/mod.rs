//! Networking for the latency harness.
//!
//! # Modules
//!
//! - [`multicast`] - UDP multicast, used by the feed publisher and the
//!   kernel-mediated receive path
//! - [`raw`] - Linux `AF_PACKET` capture, used by the poll-mode receive path

pub mod multicast;
#[cfg(target_os = "linux")]
pub mod raw;

pub use multicast::MulticastSocket;
#[cfg(target_os = "linux")]
pub use raw::RawSocket;
