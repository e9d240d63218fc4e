use std::net::{Ipv4Addr, SocketAddrV4};

use thiserror::Error;

const ETHERNET_HEADER_LEN: usize = 14;
const ETHERTYPE_IPV4: [u8; 2] = [0x08, 0x00];
const MIN_IPV4_HEADER_LEN: usize = 20;
const MIN_TCP_HEADER_LEN: usize = 20;
const IP_PROTOCOL_TCP: u8 = 6;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),
    #[error("not an IPv4 packet, version {0}")]
    NotIpv4(u8),
    #[error("not a TCP segment, protocol {0}")]
    NotTcp(u8),
    #[error("invalid {header} header length {len}")]
    InvalidHeaderLength { header: &'static str, len: usize },
    #[error("segment carries no payload")]
    NoPayload,
}

/// A TCP segment and the endpoints it travels between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSegment<'a> {
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
    pub payload: &'a [u8],
}

impl<'a> TcpSegment<'a> {
    /// Parses an IPv4 packet, optionally preceded by an Ethernet header.
    pub fn parse(packet: &'a [u8]) -> Result<Self, PacketError> {
        let ip = strip_ethernet(packet);
        if ip.len() < MIN_IPV4_HEADER_LEN {
            return Err(PacketError::TooShort(ip.len()));
        }

        let version = ip[0] >> 4;
        if version != 4 {
            return Err(PacketError::NotIpv4(version));
        }
        if ip[9] != IP_PROTOCOL_TCP {
            return Err(PacketError::NotTcp(ip[9]));
        }

        let ip_header_len = usize::from(ip[0] & 0x0f) * 4;
        if ip_header_len < MIN_IPV4_HEADER_LEN || ip.len() < ip_header_len {
            return Err(PacketError::InvalidHeaderLength {
                header: "ip",
                len: ip_header_len,
            });
        }

        // frames may be padded past the ip total length
        let total_len = usize::from(u16::from_be_bytes([ip[2], ip[3]]));
        let ip = if total_len >= ip_header_len && total_len < ip.len() {
            &ip[..total_len]
        } else {
            ip
        };

        let tcp = &ip[ip_header_len..];
        if tcp.len() < MIN_TCP_HEADER_LEN {
            return Err(PacketError::TooShort(packet.len()));
        }
        let tcp_header_len = usize::from(tcp[12] >> 4) * 4;
        if tcp_header_len < MIN_TCP_HEADER_LEN || tcp.len() < tcp_header_len {
            return Err(PacketError::InvalidHeaderLength {
                header: "tcp",
                len: tcp_header_len,
            });
        }

        let payload = &tcp[tcp_header_len..];
        if payload.is_empty() {
            return Err(PacketError::NoPayload);
        }

        let source_ip = Ipv4Addr::new(ip[12], ip[13], ip[14], ip[15]);
        let destination_ip = Ipv4Addr::new(ip[16], ip[17], ip[18], ip[19]);
        let source_port = u16::from_be_bytes([tcp[0], tcp[1]]);
        let destination_port = u16::from_be_bytes([tcp[2], tcp[3]]);

        Ok(Self {
            source: SocketAddrV4::new(source_ip, source_port),
            destination: SocketAddrV4::new(destination_ip, destination_port),
            payload,
        })
    }
}

/// Returns the TCP payload of `packet` and its endpoints, or `None` for anything else.
pub fn parse_packet(packet: &[u8]) -> Option<TcpSegment<'_>> {
    TcpSegment::parse(packet).ok()
}

fn strip_ethernet(packet: &[u8]) -> &[u8] {
    let looks_like_ip = packet.first().is_some_and(|b| b >> 4 == 4);
    if !looks_like_ip
        && packet.len() > ETHERNET_HEADER_LEN
        && packet[12..14] == ETHERTYPE_IPV4
    {
        &packet[ETHERNET_HEADER_LEN..]
    } else {
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::tcp_packet;

    fn endpoints() -> (SocketAddrV4, SocketAddrV4) {
        (
            "172.16.0.11:9000".parse().unwrap(),
            "172.16.0.12:41234".parse().unwrap(),
        )
    }

    #[test]
    fn parses_ipv4_tcp() {
        let (source, destination) = endpoints();
        let packet = tcp_packet(source, destination, b"hello");

        let segment = TcpSegment::parse(&packet).unwrap();
        assert_eq!(segment.source, source);
        assert_eq!(segment.destination, destination);
        assert_eq!(segment.payload, b"hello");
    }

    #[test]
    fn skips_ethernet_header_and_padding() {
        let (source, destination) = endpoints();
        let mut frame = vec![0xff; 12];
        frame.extend(ETHERTYPE_IPV4);
        frame.extend(tcp_packet(source, destination, b"hi"));
        frame.extend([0; 4]);

        let segment = parse_packet(&frame).unwrap();
        assert_eq!(segment.payload, b"hi");
    }

    #[test]
    fn rejects_malformed_packets() {
        let (source, destination) = endpoints();
        assert_eq!(TcpSegment::parse(&[0x45; 10]), Err(PacketError::TooShort(10)));
        assert_eq!(
            TcpSegment::parse(&tcp_packet(source, destination, b"")),
            Err(PacketError::NoPayload)
        );

        let mut udp = tcp_packet(source, destination, b"x");
        udp[9] = 17;
        assert_eq!(TcpSegment::parse(&udp), Err(PacketError::NotTcp(17)));

        let mut bad_offset = tcp_packet(source, destination, b"x");
        bad_offset[32] = 0xf0;
        assert!(parse_packet(&bad_offset).is_none());
    }
}
