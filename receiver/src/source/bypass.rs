//! Poll-mode acquisition straight from the device queue.
//!
//! Frames arrive with their Ethernet, IPv4 and UDP headers intact and include
//! every kind of traffic on the interface. Header decoding and flow filtering
//! happen in the parser, not here.

use super::{BurstSource, PacketSource, RawFrame};
use crate::config::BypassSourceConfig;
use crate::error::{SourceError, StartupError};
use crate::parser::FrameParser;
use common::frame_pool::FramePool;
use common::net::raw::RawSocket;
use common::time::wall_clock_nanos;
use std::io;

pub struct BypassSource {
    socket: Option<RawSocket>,
    pool: FramePool,
    config: BypassSourceConfig,
}

impl BypassSource {
    /// Open a non-blocking capture socket on the configured interface.
    pub fn open(config: BypassSourceConfig) -> Result<Self, StartupError> {
        if config.pool_capacity == 0 {
            return Err(StartupError::InvalidConfig(
                "frame pool capacity must be greater than 0".to_string(),
            ));
        }

        let socket = RawSocket::open(&config.interface).map_err(|source| StartupError::CaptureOpen {
            interface: config.interface.clone(),
            source,
        })?;

        let option_error = |source| StartupError::CaptureOption {
            interface: config.interface.clone(),
            source,
        };

        if let Some(group) = config.fanout_group {
            socket.join_fanout(group).map_err(option_error)?;
        }
        if config.promiscuous {
            socket.set_promiscuous().map_err(option_error)?;
        }
        if let Some(bytes) = config.recv_buffer_bytes {
            socket.set_recv_buffer_size(bytes).map_err(option_error)?;
        }
        socket.set_nonblocking(true).map_err(option_error)?;

        let pool = FramePool::with_capacity(config.pool_capacity);

        Ok(Self {
            socket: Some(socket),
            pool,
            config,
        })
    }

    pub fn config(&self) -> &BypassSourceConfig {
        &self.config
    }
}

impl PacketSource for BypassSource {
    fn parser(&self) -> FrameParser {
        FrameParser::EthernetIpv4Udp(self.config.filter)
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
        self.socket = None;
    }
}

impl BurstSource for BypassSource {
    fn acquire_batch(&mut self, max_n: usize, out: &mut Vec<RawFrame>) -> Result<usize, SourceError> {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(0);
        };

        let mut received = 0;
        while received < max_n {
            // Out of buffers: hand back what we have, the rest stays queued
            let Some(slot) = self.pool.allocate() else {
                break;
            };

            match socket.recv_into(self.pool.buffer_mut(&slot)) {
                Ok(Some(len)) => {
                    out.push(RawFrame::new(slot, len, wall_clock_nanos()));
                    received += 1;
                }
                // Our own transmission looped back
                Ok(None) => self.pool.deallocate(slot),
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) =>
                {
                    self.pool.deallocate(slot);
                    break;
                }
                Err(e) => {
                    self.pool.deallocate(slot);
                    return Err(SourceError::Receive(e));
                }
            }
        }

        Ok(received)
    }
}
