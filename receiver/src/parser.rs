//! Locating the application payload inside a received frame.
//!
//! The strategy is fixed when the receive loop starts: datagrams from a UDP
//! socket are already payload-only, raw link-layer frames need their
//! Ethernet/IPv4/UDP headers decoded. Frames that are not IPv4/UDP (or not
//! addressed to the filtered flow) produce no message. Unrelated traffic on a
//! shared medium is expected and is not an error.

use crate::protocol::{
    header_at, EthernetHeader, Ipv4Header, UdpHeader, ETHERNET_HEADER_LEN, ETHERTYPE_IPV4,
    IPPROTO_UDP, IPV4_MIN_HEADER_LEN, UDP_HEADER_LEN,
};
use std::net::Ipv4Addr;

/// Where the payload lives within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedMessage {
    pub offset: usize,
    pub len: usize,
}

impl ParsedMessage {
    /// The payload bytes of `frame`.
    #[inline]
    pub fn payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[self.offset..self.offset + self.len]
    }
}

/// Optional destination match for decoded UDP datagrams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UdpFilter {
    pub destination: Option<Ipv4Addr>,
    pub port: Option<u16>,
}

impl UdpFilter {
    /// Accept every IPv4/UDP datagram.
    pub const ANY: UdpFilter = UdpFilter {
        destination: None,
        port: None,
    };

    pub fn with_destination(mut self, destination: Ipv4Addr) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[inline]
    fn accepts(&self, ip: &Ipv4Header, udp: &UdpHeader) -> bool {
        if let Some(destination) = self.destination {
            if Ipv4Addr::from(ip.destination) != destination {
                return false;
            }
        }
        if let Some(port) = self.port {
            if udp.destination_port.get() != port {
                return false;
            }
        }
        true
    }
}

/// Payload location strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameParser {
    /// The frame is the payload (kernel already stripped and filtered headers)
    PassThrough,
    /// Decode Ethernet → IPv4 → UDP
    EthernetIpv4Udp(UdpFilter),
}

impl FrameParser {
    #[inline]
    pub fn parse(&self, frame: &[u8]) -> Option<ParsedMessage> {
        match self {
            FrameParser::PassThrough => Some(ParsedMessage {
                offset: 0,
                len: frame.len(),
            }),
            FrameParser::EthernetIpv4Udp(filter) => parse_udp(frame, filter),
        }
    }
}

#[inline]
fn parse_udp(frame: &[u8], filter: &UdpFilter) -> Option<ParsedMessage> {
    let eth: &EthernetHeader = header_at(frame)?;
    if eth.ether_type.get() != ETHERTYPE_IPV4 {
        return None;
    }

    let ip_bytes = &frame[ETHERNET_HEADER_LEN..];
    let ip: &Ipv4Header = header_at(ip_bytes)?;
    if ip.version() != 4 || ip.protocol != IPPROTO_UDP {
        return None;
    }
    let ip_len = ip.header_len();
    if ip_len < IPV4_MIN_HEADER_LEN || ip_len > ip_bytes.len() {
        return None;
    }

    let udp_offset = ETHERNET_HEADER_LEN + ip_len;
    let udp: &UdpHeader = header_at(&frame[udp_offset..])?;
    let datagram_len = usize::from(udp.length.get());
    if datagram_len < UDP_HEADER_LEN {
        return None;
    }

    let offset = udp_offset + UDP_HEADER_LEN;
    let len = datagram_len - UDP_HEADER_LEN;
    // Truncated capture or a lying length field
    if offset + len > frame.len() {
        return None;
    }

    if !filter.accepts(ip, udp) {
        return None;
    }

    Some(ParsedMessage { offset, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ethernet + 20-byte IPv4 + UDP around `payload`
    fn udp_frame(dst: [u8; 4], port: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x01, 0x00, 0x5e, 0x01, 0x01, 0x01]);
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        let total = (20 + 8 + payload.len()) as u16;
        frame.extend_from_slice(&[0x45, 0x00]);
        frame.extend_from_slice(&total.to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0x40, 0, 1, IPPROTO_UDP, 0, 0]);
        frame.extend_from_slice(&[10, 0, 0, 1]);
        frame.extend_from_slice(&dst);

        frame.extend_from_slice(&40000u16.to_be_bytes());
        frame.extend_from_slice(&port.to_be_bytes());
        frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn test_pass_through_covers_whole_frame() {
        let frame = [7u8; 40];
        let parsed = FrameParser::PassThrough.parse(&frame).unwrap();
        assert_eq!(parsed, ParsedMessage { offset: 0, len: 40 });
        assert_eq!(parsed.payload(&frame).len(), 40);
    }

    #[test]
    fn test_pass_through_accepts_empty_frame() {
        let parsed = FrameParser::PassThrough.parse(&[]).unwrap();
        assert_eq!(parsed.len, 0);
    }

    #[test]
    fn test_udp_payload_located() {
        let payload: Vec<u8> = (0..40).collect();
        let frame = udp_frame([239, 1, 1, 1], 12345, &payload);

        let parsed = FrameParser::EthernetIpv4Udp(UdpFilter::ANY).parse(&frame).unwrap();
        assert_eq!(parsed.offset, 42);
        assert_eq!(parsed.len, 40);
        assert_eq!(parsed.payload(&frame), payload.as_slice());
    }

    #[test]
    fn test_ethernet_padding_ignored() {
        // Short payloads are padded to the 60-byte Ethernet minimum
        let mut frame = udp_frame([239, 1, 1, 1], 12345, &[1, 2, 3, 4]);
        frame.resize(60, 0);

        let parsed = FrameParser::EthernetIpv4Udp(UdpFilter::ANY).parse(&frame).unwrap();
        assert_eq!(parsed.len, 4);
    }

    #[test]
    fn test_non_ipv4_rejected() {
        let mut frame = udp_frame([239, 1, 1, 1], 12345, &[0; 32]);
        // ARP
        frame[12] = 0x08;
        frame[13] = 0x06;
        assert!(FrameParser::EthernetIpv4Udp(UdpFilter::ANY).parse(&frame).is_none());
    }

    #[test]
    fn test_non_udp_rejected() {
        let mut frame = udp_frame([239, 1, 1, 1], 12345, &[0; 32]);
        // TCP
        frame[14 + 9] = 6;
        assert!(FrameParser::EthernetIpv4Udp(UdpFilter::ANY).parse(&frame).is_none());
    }

    #[test]
    fn test_ip_options_respected() {
        let payload = [9u8; 32];
        let plain = udp_frame([239, 1, 1, 1], 12345, &payload);

        // Insert one 4-byte option word and bump IHL to 6
        let mut frame = plain[..34].to_vec();
        frame[14] = 0x46;
        frame.extend_from_slice(&[1, 1, 1, 1]);
        frame.extend_from_slice(&plain[34..]);

        let parsed = FrameParser::EthernetIpv4Udp(UdpFilter::ANY).parse(&frame).unwrap();
        assert_eq!(parsed.offset, 46);
        assert_eq!(parsed.payload(&frame), &payload);
    }

    #[test]
    fn test_bad_ihl_rejected() {
        let mut frame = udp_frame([239, 1, 1, 1], 12345, &[0; 32]);
        frame[14] = 0x44;
        assert!(FrameParser::EthernetIpv4Udp(UdpFilter::ANY).parse(&frame).is_none());
    }

    #[test]
    fn test_udp_length_past_frame_rejected() {
        let mut frame = udp_frame([239, 1, 1, 1], 12345, &[0; 32]);
        frame[38..40].copy_from_slice(&200u16.to_be_bytes());
        assert!(FrameParser::EthernetIpv4Udp(UdpFilter::ANY).parse(&frame).is_none());
    }

    #[test]
    fn test_udp_length_below_header_rejected() {
        let mut frame = udp_frame([239, 1, 1, 1], 12345, &[0; 32]);
        frame[38..40].copy_from_slice(&4u16.to_be_bytes());
        assert!(FrameParser::EthernetIpv4Udp(UdpFilter::ANY).parse(&frame).is_none());
    }

    #[test]
    fn test_truncated_frames_rejected() {
        let frame = udp_frame([239, 1, 1, 1], 12345, &[0; 32]);
        let parser = FrameParser::EthernetIpv4Udp(UdpFilter::ANY);
        for cut in [0, 10, 14, 30, 41] {
            assert!(parser.parse(&frame[..cut]).is_none(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_filter_by_group_and_port() {
        let frame = udp_frame([239, 1, 1, 1], 12345, &[0; 32]);

        let matching = UdpFilter::ANY
            .with_destination(Ipv4Addr::new(239, 1, 1, 1))
            .with_port(12345);
        assert!(FrameParser::EthernetIpv4Udp(matching).parse(&frame).is_some());

        let other_group = UdpFilter::ANY.with_destination(Ipv4Addr::new(239, 1, 1, 2));
        assert!(FrameParser::EthernetIpv4Udp(other_group).parse(&frame).is_none());

        let other_port = UdpFilter::ANY.with_port(5000);
        assert!(FrameParser::EthernetIpv4Udp(other_port).parse(&frame).is_none());
    }
}
