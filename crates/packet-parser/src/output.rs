use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    net::SocketAddrV4,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    capture::{read_capture_file, CapturedPacket},
    decoder::{DecodedMessage, PacketDecoder},
    labels::AddressBook,
    packet::parse_packet,
};

/// Counts reported after a capture has been decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub packets: usize,
    pub payloads: usize,
    pub decoded: usize,
    pub output: PathBuf,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Successfully parsed file:\n    Number of Packets: {}\n   Number of Payloads: {}\n   Decoded Messages: {}\n   Output file: {}",
            self.packets,
            self.payloads,
            self.decoded,
            self.output.display()
        )
    }
}

pub fn format_line(source: &str, destination: &str, message: &DecodedMessage) -> String {
    format!(
        "Source IP: {source:>21}, Target IP: {destination:>21}, Type {:>12}, Protocol: {}, Data: {}",
        message.kind.to_string(),
        message.protocol,
        message.data
    )
}

fn endpoint(addr: SocketAddrV4, labels: Option<&AddressBook>) -> String {
    let addr = addr.to_string();
    match labels {
        Some(labels) => labels.label_line(&addr),
        None => addr,
    }
}

/// Writes one line per decoded message and returns the summary counts, without the output path.
pub fn write_decoded<W: Write>(
    packets: &[CapturedPacket],
    decoder: &PacketDecoder,
    labels: Option<&AddressBook>,
    mut out: W,
) -> Result<Summary> {
    let mut summary = Summary {
        packets: packets.len(),
        ..Default::default()
    };

    for packet in packets {
        let Some(segment) = parse_packet(&packet.data) else {
            continue;
        };
        summary.payloads += 1;

        let Some(messages) = decoder.decode_payload(segment.payload) else {
            debug!(
                timestamp = %packet.timestamp,
                source = %segment.source,
                len = segment.payload.len(),
                "payload not decoded"
            );
            continue;
        };

        let source = endpoint(segment.source, labels);
        let destination = endpoint(segment.destination, labels);
        for message in messages {
            writeln!(out, "{}", format_line(&source, &destination, &message))?;
            summary.decoded += 1;
        }
    }

    out.flush()?;
    Ok(summary)
}

/// Decodes the `tcpdump` text capture at `source` into `output`.
pub fn parse_capture_file(
    source: &Path,
    output: &Path,
    decoder: &PacketDecoder,
    labels: Option<&AddressBook>,
) -> Result<Summary> {
    let packets = read_capture_file(source)
        .with_context(|| format!("failed to read capture {}", source.display()))?;
    info!(packets = packets.len(), source = %source.display(), "read capture");

    let file = File::create(output)
        .with_context(|| format!("failed to create output file {}", output.display()))?;
    let summary = write_decoded(&packets, decoder, labels, BufWriter::new(file))?;

    Ok(Summary {
        output: output.to_path_buf(),
        ..summary
    })
}

#[cfg(test)]
mod tests {
    use light_client::config::{networks, NetworkSpec};
    use ssz::Encode;

    use super::*;
    use crate::{
        decoder::PayloadKind,
        rpc::methods::BlocksByRangeRequest,
        test_utils::{ssz_snappy, tcp_packet},
    };

    fn decoder() -> PacketDecoder {
        let mainnet = networks::mainnet();
        PacketDecoder::new(&NetworkSpec {
            chain: mainnet.chain,
            forks: mainnet.forks,
        })
    }

    #[test]
    fn line_format() {
        let message = DecodedMessage {
            kind: PayloadKind::RpcRequest,
            protocol: "/eth2/beacon_chain/req/ping/1/ssz_snappy".to_string(),
            data: "Ping { data: 1 }".to_string(),
        };
        assert_eq!(
            format_line("10.0.0.1:9000", "10.0.0.2:40000", &message),
            "Source IP:         10.0.0.1:9000, Target IP:        10.0.0.2:40000, Type  RPC Request, Protocol: /eth2/beacon_chain/req/ping/1/ssz_snappy, Data: Ping { data: 1 }"
        );
    }

    #[test]
    fn writes_decoded_messages() {
        let source = "172.16.0.11:9000".parse().unwrap();
        let destination = "172.16.0.12:41234".parse().unwrap();
        let request = BlocksByRangeRequest {
            start_slot: 64,
            count: 32,
            step: 1,
        };
        let request = ssz_snappy(&request.as_ssz_bytes());
        let packets = vec![
            CapturedPacket {
                timestamp: "10:00:00.000001".to_string(),
                data: tcp_packet(source, destination, &request),
            },
            CapturedPacket {
                timestamp: "10:00:00.000002".to_string(),
                data: tcp_packet(source, destination, b"GET / HTTP/1.1\r\n\r\n"),
            },
            CapturedPacket {
                timestamp: "10:00:00.000003".to_string(),
                data: tcp_packet(source, destination, b""),
            },
        ];
        let mut labels = AddressBook::default();
        labels.insert(*source.ip(), "cl-1");

        let mut out = vec![];
        let summary = write_decoded(&packets, &decoder(), Some(&labels), &mut out).unwrap();
        assert_eq!(summary.packets, 3);
        assert_eq!(summary.payloads, 2);
        assert_eq!(summary.decoded, 1);

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Source IP:             cl-1:9000, Target IP:     172.16.0.12:41234"));
        assert!(out.contains("Protocol: /eth2/beacon_chain/req/beacon_blocks_by_range/2/ssz_snappy"));
        assert!(out.ends_with("Data: BlocksByRange { start_slot: 64, count: 32 }\n"));
    }
}
