//! Packet acquisition.
//!
//! Two acquisition shapes share one frame contract:
//! - [`BlockingSource`]: each call waits for exactly one frame
//! - [`BurstSource`]: each call returns whatever is ready, possibly nothing
//!
//! Frames live in buffers owned by the source. A [`RawFrame`] is the exclusive
//! handle to one of them and must go back through [`PacketSource::release`]
//! exactly once, whether or not it held a valid message.

pub mod kernel;

#[cfg(target_os = "linux")]
pub mod bypass;

pub use kernel::KernelSource;

#[cfg(target_os = "linux")]
pub use bypass::BypassSource;

use crate::error::SourceError;
use crate::parser::FrameParser;
use common::frame_pool::FrameSlot;
use common::time::Nanos;

/// A received frame: buffer handle, length, and the wall-clock time it was
/// taken off the socket.
#[derive(Debug)]
#[must_use = "a RawFrame must be released back to its source"]
pub struct RawFrame {
    slot: FrameSlot,
    len: usize,
    received_at: Nanos,
}

impl RawFrame {
    #[inline]
    pub fn new(slot: FrameSlot, len: usize, received_at: Nanos) -> Self {
        Self {
            slot,
            len,
            received_at,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn received_at(&self) -> Nanos {
        self.received_at
    }

    #[inline]
    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    /// Give up the frame, returning its buffer handle.
    #[inline]
    pub fn into_slot(self) -> FrameSlot {
        self.slot
    }
}

/// Capabilities shared by both acquisition shapes.
pub trait PacketSource {
    /// How payloads are located in this source's frames. Fixed for the
    /// lifetime of the source.
    fn parser(&self) -> FrameParser;

    /// The received bytes of `frame`.
    fn frame_bytes(&self, frame: &RawFrame) -> &[u8];

    /// Return a frame's buffer to the source.
    fn release(&mut self, frame: RawFrame);

    /// Frames handed out and not yet released.
    fn frames_outstanding(&self) -> usize;

    /// Stop receiving and release the underlying network resource.
    fn close(&mut self) {}
}

/// One frame per call.
pub trait BlockingSource: PacketSource {
    /// Wait for the next frame.
    ///
    /// Interrupted waits are retried internally. Returns `Ok(None)` only when
    /// cancellation was observed while waiting.
    fn acquire(&mut self) -> Result<Option<RawFrame>, SourceError>;
}

/// Zero to `max_n` frames per call, never blocking.
pub trait BurstSource: PacketSource {
    /// Append up to `max_n` ready frames to `out` and return how many were
    /// appended. Zero is a normal outcome.
    fn acquire_batch(&mut self, max_n: usize, out: &mut Vec<RawFrame>) -> Result<usize, SourceError>;
}
