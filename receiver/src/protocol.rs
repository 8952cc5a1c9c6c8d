// Link, network and transport headers seen on the poll-mode path
//
// Zero-copy views via zerocopy. All structs are #[repr(C)] and built from
// unaligned field types, so they can be overlaid on any byte offset of a
// received frame.

use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const IPPROTO_UDP: u8 = 17;

pub const ETHERNET_HEADER_LEN: usize = std::mem::size_of::<EthernetHeader>();
pub const IPV4_MIN_HEADER_LEN: usize = std::mem::size_of::<Ipv4Header>();
pub const UDP_HEADER_LEN: usize = std::mem::size_of::<UdpHeader>();

/// Ethernet II header (14 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct EthernetHeader {
    pub destination: [u8; 6],
    pub source: [u8; 6],
    pub ether_type: U16<BigEndian>,
}

/// IPv4 header without options (20 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub dscp_ecn: u8,
    pub total_length: U16<BigEndian>,
    pub identification: U16<BigEndian>,
    pub flags_fragment: U16<BigEndian>,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: U16<BigEndian>,
    pub source: [u8; 4],
    pub destination: [u8; 4],
}

impl Ipv4Header {
    #[inline]
    pub fn version(&self) -> u8 {
        self.version_ihl >> 4
    }

    /// Header length in bytes including options
    #[inline]
    pub fn header_len(&self) -> usize {
        usize::from(self.version_ihl & 0x0F) * 4
    }
}

/// UDP header (8 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct UdpHeader {
    pub source_port: U16<BigEndian>,
    pub destination_port: U16<BigEndian>,
    /// Header plus payload, in bytes
    pub length: U16<BigEndian>,
    pub checksum: U16<BigEndian>,
}

/// View a header at the start of `bytes`
#[inline]
pub fn header_at<H: FromBytes + Unaligned>(bytes: &[u8]) -> Option<&H> {
    H::ref_from_prefix(bytes)
}
