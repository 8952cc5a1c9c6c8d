// Market data message format
//
// Every message starts with a 32-byte header:
// - bytes [0, 8):  sender transmit timestamp, ns since the Unix epoch, big-endian
// - bytes [8, 32): opaque to receivers
// Anything after byte 32 is application payload and is not interpreted.
//
// The feed publisher fills the opaque region with an order book update.
// All multi-byte fields are network byte order.

use zerocopy::byteorder::{BigEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Minimum length of a valid message in bytes.
pub const MIN_MESSAGE_LEN: usize = 32;

/// Fixed prefix of every market data message.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct MessageHeader {
    pub send_timestamp_ns: U64<BigEndian>,
    pub reserved: [u8; 24],
}

impl MessageHeader {
    /// View the header at the start of `payload`. `None` when the payload
    /// is shorter than [`MIN_MESSAGE_LEN`].
    #[inline]
    pub fn from_prefix(payload: &[u8]) -> Option<&Self> {
        FromBytes::ref_from_prefix(payload)
    }

    #[inline]
    pub fn send_timestamp(&self) -> u64 {
        self.send_timestamp_ns.get()
    }
}

/// Order book top-of-book update published by the feed.
///
/// Layout (32 bytes total):
/// - timestamp_ns: u64 - transmit time
/// - symbol: [u8; 4] - ASCII, NUL padded
/// - bid_price: u32 - cents
/// - bid_size: u32
/// - ask_price: u32 - cents
/// - ask_size: u32
/// - sequence: u32
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct OrderBookUpdate {
    pub timestamp_ns: U64<BigEndian>,
    pub symbol: [u8; 4],
    pub bid_price: U32<BigEndian>,
    pub bid_size: U32<BigEndian>,
    pub ask_price: U32<BigEndian>,
    pub ask_size: U32<BigEndian>,
    pub sequence: U32<BigEndian>,
}

/// Size of an OrderBookUpdate message in bytes
pub const ORDER_BOOK_UPDATE_SIZE: usize = std::mem::size_of::<OrderBookUpdate>();

impl OrderBookUpdate {
    /// Build an update. `symbol` is truncated to 4 bytes and NUL padded.
    #[allow(clippy::too_many_arguments)]
    #[inline]
    pub fn new(
        timestamp_ns: u64,
        symbol: &str,
        bid_price: u32,
        bid_size: u32,
        ask_price: u32,
        ask_size: u32,
        sequence: u32,
    ) -> Self {
        let mut symbol_bytes = [0u8; 4];
        let len = symbol.len().min(4);
        symbol_bytes[..len].copy_from_slice(&symbol.as_bytes()[..len]);

        Self {
            timestamp_ns: U64::new(timestamp_ns),
            symbol: symbol_bytes,
            bid_price: U32::new(bid_price),
            bid_size: U32::new(bid_size),
            ask_price: U32::new(ask_price),
            ask_size: U32::new(ask_size),
            sequence: U32::new(sequence),
        }
    }

    /// Get a byte slice reference to this message (zero-copy)
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        AsBytes::as_bytes(self)
    }

    /// Create a reference from a byte slice (zero-copy)
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<&Self> {
        FromBytes::ref_from(bytes)
    }

    /// Symbol with trailing NUL padding removed
    pub fn symbol_str(&self) -> &str {
        let end = self.symbol.iter().position(|&b| b == 0).unwrap_or(4);
        std::str::from_utf8(&self.symbol[..end]).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(std::mem::size_of::<MessageHeader>(), MIN_MESSAGE_LEN);
        assert_eq!(ORDER_BOOK_UPDATE_SIZE, 32);
    }

    #[test]
    fn test_header_reads_big_endian_timestamp() {
        let mut payload = [0u8; 40];
        payload[..8].copy_from_slice(&0x0102_0304_0506_0708u64.to_be_bytes());

        let header = MessageHeader::from_prefix(&payload).unwrap();
        assert_eq!(header.send_timestamp(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_header_rejects_short_payload() {
        assert!(MessageHeader::from_prefix(&[0u8; 31]).is_none());
        assert!(MessageHeader::from_prefix(&[0u8; 32]).is_some());
    }

    #[test]
    fn test_order_book_update_layout() {
        let update = OrderBookUpdate::new(1_700_000_000_000_000_000, "AAPL", 9995, 1000, 10005, 1001, 7);
        let bytes = update.as_bytes();

        assert_eq!(&bytes[..8], &1_700_000_000_000_000_000u64.to_be_bytes());
        assert_eq!(&bytes[8..12], b"AAPL");
        assert_eq!(&bytes[12..16], &9995u32.to_be_bytes());
        assert_eq!(&bytes[28..32], &7u32.to_be_bytes());

        let header = MessageHeader::from_prefix(bytes).unwrap();
        assert_eq!(header.send_timestamp(), 1_700_000_000_000_000_000);
    }

    #[test]
    fn test_symbol_padding_and_truncation() {
        let short = OrderBookUpdate::new(0, "FB", 0, 0, 0, 0, 0);
        assert_eq!(short.symbol, *b"FB\0\0");
        assert_eq!(short.symbol_str(), "FB");

        let long = OrderBookUpdate::new(0, "GOOGL", 0, 0, 0, 0, 0);
        assert_eq!(long.symbol_str(), "GOOG");
    }

    #[test]
    fn test_from_bytes_requires_exact_length() {
        let update = OrderBookUpdate::new(5, "MSFT", 1, 2, 3, 4, 9);
        let parsed = OrderBookUpdate::from_bytes(update.as_bytes()).unwrap();
        assert_eq!(parsed.sequence.get(), 9);
        assert!(OrderBookUpdate::from_bytes(&update.as_bytes()[..31]).is_none());
    }
}
