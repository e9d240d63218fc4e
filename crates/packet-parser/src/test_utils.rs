use std::{io::Write, net::SocketAddrV4};

use prost::{encoding::encode_varint, Message};
use snap::{raw::Encoder, write::FrameEncoder};

use crate::gossip::proto;

/// Builds an IPv4 packet carrying a TCP segment with `payload`.
pub fn tcp_packet(source: SocketAddrV4, destination: SocketAddrV4, payload: &[u8]) -> Vec<u8> {
    let total_len = u16::try_from(40 + payload.len()).unwrap();

    let mut packet = vec![0x45, 0x00];
    packet.extend(total_len.to_be_bytes());
    packet.extend([0x00, 0x01, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00]);
    packet.extend(source.ip().octets());
    packet.extend(destination.ip().octets());

    packet.extend(source.port().to_be_bytes());
    packet.extend(destination.port().to_be_bytes());
    packet.extend(1u32.to_be_bytes());
    packet.extend(1u32.to_be_bytes());
    packet.extend([0x50, 0x18, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00]);

    packet.extend(payload);
    packet
}

/// `<varint length><snappy frames>` encoding of an SSZ payload.
pub fn ssz_snappy(ssz: &[u8]) -> Vec<u8> {
    let mut out = vec![];
    encode_varint(ssz.len() as u64, &mut out);
    let mut encoder = FrameEncoder::new(out);
    encoder.write_all(ssz).unwrap();
    encoder.into_inner().unwrap()
}

pub fn response_chunk(code: u8, context: Option<[u8; 4]>, ssz: &[u8]) -> Vec<u8> {
    let mut chunk = vec![code];
    if let Some(context) = context {
        chunk.extend(context);
    }
    chunk.extend(ssz_snappy(ssz));
    chunk
}

pub fn published(topic: &str, ssz: &[u8]) -> proto::RawMessage {
    proto::RawMessage {
        data: Some(Encoder::new().compress_vec(ssz).unwrap()),
        topic: topic.to_string(),
        ..Default::default()
    }
}

/// A varint length prefixed gossipsub RPC frame.
pub fn gossip_frame(rpc: &proto::Rpc) -> Vec<u8> {
    rpc.encode_length_delimited_to_vec()
}

/// A multistream-select line.
pub fn multistream_line(line: &str) -> Vec<u8> {
    let mut out = vec![];
    encode_varint(line.len() as u64 + 1, &mut out);
    out.extend(line.as_bytes());
    out.push(b'\n');
    out
}
