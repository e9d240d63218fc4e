//! Reader for the text dumps written by `tcpdump -x` / `tcpdump -X`.
//!
//! ```text
//! 12:33:16.043916 IP 172.16.0.11.9000 > 172.16.0.12.41234: Flags [P.], length 78
//!     0x0000:  4500 0076 1c46 4000 4006 c1d3 ac10 000b  E..v.F@.@.......
//!     0x0010:  ac10 000c 2328 a112 ...
//! ```

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPacket {
    pub timestamp: String,
    pub data: Vec<u8>,
}

pub fn read_capture_file(path: &Path) -> io::Result<Vec<CapturedPacket>> {
    let file = File::open(path)?;
    parse_capture(BufReader::new(file))
}

pub fn parse_capture<R: BufRead>(reader: R) -> io::Result<Vec<CapturedPacket>> {
    let mut packets = vec![];
    let mut current: Option<CapturedPacket> = None;

    for line in reader.lines() {
        let line = line?;

        if let Some(timestamp) = packet_timestamp(&line) {
            packets.extend(current.take());
            current = Some(CapturedPacket {
                timestamp: timestamp.to_string(),
                data: vec![],
            });
            continue;
        }

        if let (Some(packet), Some(bytes)) = (current.as_mut(), hex_line_bytes(&line)) {
            packet.data.extend(bytes);
        }
    }
    packets.extend(current);

    Ok(packets)
}

/// The timestamp of a packet header line. A `-tttt` date prefix is allowed.
fn packet_timestamp(line: &str) -> Option<&str> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    line.split_whitespace()
        .take(2)
        .find(|token| is_timestamp(token))
}

/// `HH:MM:SS.ffffff`
fn is_timestamp(token: &str) -> bool {
    let Some((time, fraction)) = token.split_once('.') else {
        return false;
    };
    let parts: Vec<&str> = time.split(':').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit()))
        && !fraction.is_empty()
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

/// Bytes of a `0xNNNN:` line. The ASCII column printed by `-X` follows the hex groups after two
/// spaces and is ignored.
fn hex_line_bytes(line: &str) -> Option<Vec<u8>> {
    let (offset, rest) = line.trim_start().split_once(':')?;
    let offset = offset.strip_prefix("0x")?;
    if offset.is_empty() || !offset.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let hex_column = rest.trim_start().split("  ").next().unwrap_or_default();
    let mut bytes = vec![];
    for group in hex_column.split_whitespace() {
        if group.len() % 2 != 0 {
            return None;
        }
        bytes.extend(hex::decode(group).ok()?);
    }
    Some(bytes)
}
