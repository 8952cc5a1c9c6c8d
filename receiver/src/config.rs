//! Receiver configuration.
//!
//! Values arrive already parsed from the command line; constructors here only
//! apply defaults.

use crate::parser::UdpFilter;
use crate::reporter::DEFAULT_REPORT_INTERVAL;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Frames requested per poll on the burst path.
pub const DEFAULT_BURST_SIZE: usize = 32;

/// Frame buffers per burst source.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

/// How often a blocked kernel receive wakes up to check for cancellation.
pub const DEFAULT_WAKE_INTERVAL: Duration = Duration::from_millis(100);

/// Settings for the receive loop itself.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub report_interval: Duration,
    pub burst_size: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            report_interval: DEFAULT_REPORT_INTERVAL,
            burst_size: DEFAULT_BURST_SIZE,
        }
    }
}

impl SupervisorConfig {
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_burst_size(mut self, burst_size: usize) -> Self {
        self.burst_size = burst_size;
        self
    }
}

/// Kernel-mediated path: a UDP socket joined to a multicast group.
#[derive(Debug, Clone)]
pub struct KernelSourceConfig {
    pub group: Ipv4Addr,
    pub port: u16,
    pub interface: Ipv4Addr,
    /// Upper bound on one blocking wait. `None` blocks until a datagram
    /// arrives, so cancellation is only seen on the next datagram.
    pub wake_interval: Option<Duration>,
    pub recv_buffer_bytes: Option<usize>,
}

impl KernelSourceConfig {
    pub fn new(group: Ipv4Addr, port: u16) -> Self {
        Self {
            group,
            port,
            interface: Ipv4Addr::UNSPECIFIED,
            wake_interval: Some(DEFAULT_WAKE_INTERVAL),
            recv_buffer_bytes: None,
        }
    }

    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_wake_interval(mut self, wake_interval: Option<Duration>) -> Self {
        self.wake_interval = wake_interval;
        self
    }

    pub fn with_recv_buffer(mut self, bytes: usize) -> Self {
        self.recv_buffer_bytes = Some(bytes);
        self
    }
}

impl Default for KernelSourceConfig {
    fn default() -> Self {
        Self::new(Ipv4Addr::new(239, 1, 1, 1), 12345)
    }
}

/// Kernel-bypass path: a link-layer capture socket polled without blocking.
#[derive(Debug, Clone)]
pub struct BypassSourceConfig {
    pub interface: String,
    /// Fanout group shared by per-core instances on the same interface
    pub fanout_group: Option<u16>,
    /// On by default so groups the host never joined still reach the socket
    pub promiscuous: bool,
    pub filter: UdpFilter,
    pub pool_capacity: usize,
    pub recv_buffer_bytes: Option<usize>,
}

impl BypassSourceConfig {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            fanout_group: None,
            promiscuous: true,
            filter: UdpFilter::ANY,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            recv_buffer_bytes: None,
        }
    }

    pub fn with_fanout_group(mut self, group: u16) -> Self {
        self.fanout_group = Some(group);
        self
    }

    pub fn with_promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    pub fn with_filter(mut self, filter: UdpFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_recv_buffer(mut self, bytes: usize) -> Self {
        self.recv_buffer_bytes = Some(bytes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.report_interval, Duration::from_secs(5));
        assert_eq!(config.burst_size, 32);
    }

    #[test]
    fn test_kernel_defaults() {
        let config = KernelSourceConfig::default();
        assert_eq!(config.group, Ipv4Addr::new(239, 1, 1, 1));
        assert_eq!(config.port, 12345);
        assert_eq!(config.interface, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.wake_interval, Some(DEFAULT_WAKE_INTERVAL));
    }

    #[test]
    fn test_bypass_defaults_to_promiscuous() {
        let config = BypassSourceConfig::new("eth0");
        assert!(config.promiscuous);
        assert_eq!(config.fanout_group, None);
        assert_eq!(config.pool_capacity, DEFAULT_POOL_CAPACITY);
    }

    #[test]
    fn test_bypass_builder() {
        let filter = UdpFilter::ANY.with_port(12345);
        let config = BypassSourceConfig::new("eth0")
            .with_fanout_group(7)
            .with_promiscuous(false)
            .with_filter(filter)
            .with_pool_capacity(64);

        assert_eq!(config.interface, "eth0");
        assert_eq!(config.fanout_group, Some(7));
        assert!(!config.promiscuous);
        assert_eq!(config.filter, filter);
        assert_eq!(config.pool_capacity, 64);
    }
}
