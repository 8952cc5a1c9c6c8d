//! Sender timestamp extraction and latency computation.

use common::time::Nanos;
use common::wire::MessageHeader;

/// Reads the transmit timestamp embedded in a message payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampExtractor;

impl TimestampExtractor {
    /// Latency of one message: `received_at - send timestamp`, in wrapping
    /// u64 arithmetic. A sender clock ahead of ours yields a huge value rather
    /// than a negative one; it is reported as observed.
    ///
    /// `None` when the payload is shorter than the 32-byte message header.
    #[inline]
    pub fn latency(&self, payload: &[u8], received_at: Nanos) -> Option<u64> {
        let header = MessageHeader::from_prefix(payload)?;
        Some(received_at.as_u64().wrapping_sub(header.send_timestamp()))
    }
}
