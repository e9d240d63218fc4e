use std::{fmt::Write as _, fs, net::SocketAddrV4};

use cl_packet_parser::{decoder::PacketDecoder, labels::AddressBook, output::parse_capture_file};
use light_client::config::{networks, NetworkSpec};
use prost::encoding::encode_varint;

fn ipv4_tcp(source: SocketAddrV4, destination: SocketAddrV4, payload: &[u8]) -> Vec<u8> {
    let total_len = (40 + payload.len()) as u16;
    let mut packet = vec![0x45, 0x00];
    packet.extend(total_len.to_be_bytes());
    packet.extend([0x12, 0x34, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00]);
    packet.extend(source.ip().octets());
    packet.extend(destination.ip().octets());
    packet.extend(source.port().to_be_bytes());
    packet.extend(destination.port().to_be_bytes());
    packet.extend([0, 0, 0, 1, 0, 0, 0, 1, 0x50, 0x18, 0x01, 0xf5, 0, 0, 0, 0]);
    packet.extend(payload);
    packet
}

/// Renders `packet` the way `tcpdump -X` prints it.
fn tcpdump_text(timestamp: &str, packet: &[u8]) -> String {
    let mut text = format!("{timestamp} IP 172.16.0.11.9000 > 172.16.0.12.41234: Flags [P.], length {}\n", packet.len());
    for (i, line) in packet.chunks(16).enumerate() {
        let groups: Vec<String> = line.chunks(2).map(hex::encode).collect();
        let ascii: String = line
            .iter()
            .map(|b| if b.is_ascii_graphic() { *b as char } else { '.' })
            .collect();
        writeln!(text, "\t0x{:04x}:  {:<39}  {ascii}", i * 16, groups.join(" ")).unwrap();
    }
    text
}

fn multistream(lines: &[&str]) -> Vec<u8> {
    let mut out = vec![];
    for line in lines {
        encode_varint(line.len() as u64 + 1, &mut out);
        out.extend(line.as_bytes());
        out.push(b'\n');
    }
    out
}

#[test_log::test]
fn decodes_capture_into_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.txt");
    let output = dir.path().join("decoded.txt");

    let cl = "172.16.0.11:9000".parse().unwrap();
    let peer = "172.16.0.12:41234".parse().unwrap();
    let mut text = tcpdump_text(
        "12:33:16.043916",
        &ipv4_tcp(
            peer,
            cl,
            &multistream(&["/multistream/1.0.0", "/eth2/beacon_chain/req/ping/1/ssz_snappy"]),
        ),
    );
    text.push_str(&tcpdump_text("12:33:16.044001", &ipv4_tcp(cl, peer, b"\x00\x01garbage")));
    text.push_str("12:33:16.050000 IP 172.16.0.11.9000 > 172.16.0.12.41234: Flags [.], ack 1, length 0\n");
    fs::write(&capture, text).unwrap();

    let mainnet = networks::mainnet();
    let decoder = PacketDecoder::new(&NetworkSpec {
        chain: mainnet.chain,
        forks: mainnet.forks,
    });
    let mut labels = AddressBook::default();
    labels.insert(*cl.ip(), "cl-1-lighthouse");

    let summary = parse_capture_file(&capture, &output, &decoder, Some(&labels)).unwrap();
    assert_eq!(summary.packets, 3);
    assert_eq!(summary.payloads, 2);
    assert_eq!(summary.decoded, 2);
    assert_eq!(summary.output, output);

    let decoded = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = decoded.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Target IP:  cl-1-lighthouse:9000"));
    assert!(lines[0].contains("Type  Multistream"));
    assert!(lines[1].ends_with("Data: /eth2/beacon_chain/req/ping/1/ssz_snappy"));
}

#[test]
fn missing_capture_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mainnet = networks::mainnet();
    let decoder = PacketDecoder::new(&NetworkSpec {
        chain: mainnet.chain,
        forks: mainnet.forks,
    });

    let err = parse_capture_file(
        &dir.path().join("missing.txt"),
        &dir.path().join("out.txt"),
        &decoder,
        None,
    )
    .unwrap_err();
    assert!(err.to_string().contains("failed to read capture"));
}
