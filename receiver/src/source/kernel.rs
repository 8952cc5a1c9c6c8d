//! Kernel-mediated acquisition: a blocking UDP multicast socket.
//!
//! The kernel has already stripped link, IP and UDP headers and filtered on
//! group and port, so frames are payload-only.

use super::{BlockingSource, PacketSource, RawFrame};
use crate::cancel::CancellationToken;
use crate::config::KernelSourceConfig;
use crate::error::{SourceError, StartupError};
use crate::parser::FrameParser;
use common::frame_pool::FramePool;
use common::net::multicast::MulticastSocket;
use common::time::wall_clock_nanos;
use std::io;

/// Frames outstanding at once. The receive loop releases every frame before
/// asking for the next, so a small pool suffices.
const KERNEL_POOL_CAPACITY: usize = 2;

pub struct KernelSource {
    socket: Option<MulticastSocket>,
    pool: FramePool,
    cancel: CancellationToken,
    config: KernelSourceConfig,
}

impl KernelSource {
    /// Bind to the configured port and join the multicast group.
    pub fn open(config: KernelSourceConfig, cancel: CancellationToken) -> Result<Self, StartupError> {
        let socket = MulticastSocket::join_group(config.group, config.port, config.interface).map_err(
            |source| StartupError::MulticastJoin {
                group: config.group,
                port: config.port,
                interface: config.interface,
                source,
            },
        )?;

        // Reads time out so cancellation is observed while no data flows
        socket
            .set_read_timeout(config.wake_interval)
            .map_err(StartupError::SocketOption)?;

        if let Some(bytes) = config.recv_buffer_bytes {
            socket
                .set_recv_buffer_size(bytes)
                .map_err(StartupError::SocketOption)?;
        }

        Ok(Self {
            socket: Some(socket),
            pool: FramePool::with_capacity(KERNEL_POOL_CAPACITY),
            cancel,
            config,
        })
    }

    pub fn config(&self) -> &KernelSourceConfig {
        &self.config
    }
}

/// Waits that ended without data and without a real failure.
#[inline]
fn is_interrupted_wait(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

impl PacketSource for KernelSource {
    fn parser(&self) -> FrameParser {
        FrameParser::PassThrough
    }

    #[inline]
    fn frame_bytes(&self, frame: &RawFrame) -> &[u8] {
        &self.pool.buffer(frame.slot())[..frame.len()]
    }

    #[inline]
    fn release(&mut self, frame: RawFrame) {
        self.pool.deallocate(frame.into_slot());
    }

    fn frames_outstanding(&self) -> usize {
        self.pool.in_use()
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            // Dropping the socket leaves the group as well; this just makes it explicit
            let _ = socket.leave_group(self.config.group, self.config.interface);
        }
    }
}

impl BlockingSource for KernelSource {
    fn acquire(&mut self) -> Result<Option<RawFrame>, SourceError> {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(None);
        };

        let slot = self.pool.allocate().ok_or(SourceError::PoolExhausted {
            in_use: self.pool.in_use(),
            capacity: self.pool.capacity(),
        })?;

        loop {
            if self.cancel.is_cancelled() {
                self.pool.deallocate(slot);
                return Ok(None);
            }

            match socket.recv_into(self.pool.buffer_mut(&slot)) {
                Ok(len) => {
                    let received_at = wall_clock_nanos();
                    return Ok(Some(RawFrame::new(slot, len, received_at)));
                }
                Err(e) if is_interrupted_wait(&e) => continue,
                Err(e) => {
                    self.pool.deallocate(slot);
                    return Err(SourceError::Receive(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_interrupted_wait_classification() {
        assert!(is_interrupted_wait(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(is_interrupted_wait(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_interrupted_wait(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_interrupted_wait(&io::Error::from(io::ErrorKind::ConnectionReset)));
    }

    #[test]
    fn test_open_rejects_unicast_group() {
        let config = KernelSourceConfig::new(Ipv4Addr::new(10, 0, 0, 1), 12345);
        let result = KernelSource::open(config, CancellationToken::new());
        assert!(matches!(result, Err(StartupError::MulticastJoin { .. })));
    }

    #[test]
    fn test_cancelled_acquire_returns_none_and_releases() {
        let config = KernelSourceConfig::new(Ipv4Addr::new(239, 255, 77, 1), 0)
            .with_interface(Ipv4Addr::LOCALHOST)
            .with_wake_interval(Some(Duration::from_millis(10)));
        let cancel = CancellationToken::new();

        // Joining may be refused in sandboxes without multicast routes
        let Ok(mut source) = KernelSource::open(config, cancel.clone()) else {
            return;
        };

        cancel.cancel();
        assert!(source.acquire().unwrap().is_none());
        assert_eq!(source.frames_outstanding(), 0);

        source.close();
        assert!(source.acquire().unwrap().is_none());
    }

    #[test]
    fn test_acquire_keeps_waiting_across_wake_intervals() {
        const GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 77, 2);
        const PORT: u16 = 47_311;
        let wake = Duration::from_millis(10);

        let config = KernelSourceConfig::new(GROUP, PORT)
            .with_interface(Ipv4Addr::LOCALHOST)
            .with_wake_interval(Some(wake));
        let cancel = CancellationToken::new();

        let Ok(mut source) = KernelSource::open(config, cancel.clone()) else {
            return;
        };

        let payload: Vec<u8> = (0u8..32).collect();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let sender = {
            let payload = payload.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(wake * 3 + Duration::from_millis(5));
                let sent = MulticastSocket::new().and_then(|socket| {
                    socket.set_multicast_interface(Ipv4Addr::LOCALHOST)?;
                    socket.set_multicast_loop(true)?;
                    socket.send_to(&payload, GROUP, PORT)
                });
                if sent.is_err() {
                    cancel.cancel();
                    return;
                }
                // Loopback multicast may be unroutable; stop waiting eventually
                if done_rx.recv_timeout(Duration::from_secs(2)).is_err() {
                    cancel.cancel();
                }
            })
        };

        let started = Instant::now();
        let frame = source.acquire().unwrap();
        let waited = started.elapsed();
        let _ = done_tx.send(());

        let Some(frame) = frame else {
            // Nothing was delivered on this host
            sender.join().unwrap();
            return;
        };

        assert!(waited >= wake * 2, "returned after {:?}", waited);
        assert_eq!(source.frame_bytes(&frame), &payload[..]);
        source.release(frame);
        assert_eq!(source.frames_outstanding(), 0);

        source.close();
        sender.join().unwrap();
    }
}
