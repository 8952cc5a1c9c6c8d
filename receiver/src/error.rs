//! Error types for the receive path.
//!
//! Only failures of the acquisition resource itself are errors. Interrupted
//! waits are retried inside the sources and invalid or unrelated messages are
//! plain `None` values in the processing stage.

use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

/// The source could not be opened; the receive loop never starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to join multicast group {group}:{port} on {interface}: {source}")]
    MulticastJoin {
        group: Ipv4Addr,
        port: u16,
        interface: Ipv4Addr,
        #[source]
        source: io::Error,
    },

    #[error("failed to configure multicast socket: {0}")]
    SocketOption(#[source] io::Error),

    #[error("failed to open capture socket on {interface}: {source}")]
    CaptureOpen {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to configure capture socket on {interface}: {source}")]
    CaptureOption {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid receiver configuration: {0}")]
    InvalidConfig(String),
}

/// The source failed while running and cannot deliver further frames.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("no free frame buffer: {in_use} of {capacity} frames not released")]
    PoolExhausted { in_use: usize, capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_messages() {
        let err = StartupError::MulticastJoin {
            group: Ipv4Addr::new(239, 1, 1, 1),
            port: 12345,
            interface: Ipv4Addr::UNSPECIFIED,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(
            err.to_string(),
            "failed to join multicast group 239.1.1.1:12345 on 0.0.0.0: in use"
        );
    }

    #[test]
    fn test_source_error_keeps_cause() {
        use std::error::Error as _;

        let err = SourceError::Receive(io::Error::new(io::ErrorKind::Other, "device gone"));
        assert_eq!(err.to_string(), "receive failed: device gone");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_pool_exhausted_message() {
        let err = SourceError::PoolExhausted {
            in_use: 4,
            capacity: 4,
        };
        assert_eq!(err.to_string(), "no free frame buffer: 4 of 4 frames not released");
    }
}
