//! Multistream-select negotiation lines, e.g. `/multistream/1.0.0` or a protocol id.

use prost::encoding::decode_varint;

/// Longest line a negotiation message may carry.
const MAX_LINE_LEN: usize = 1024;

/// Decodes a payload made only of `<varint length><utf-8 line>\n` messages.
///
/// Returns `None` unless the whole payload is consumed by at least one well formed line.
pub fn decode_multistream(payload: &[u8]) -> Option<Vec<String>> {
    let mut bytes = payload;
    let mut lines = vec![];

    while !bytes.is_empty() {
        let len = usize::try_from(decode_varint(&mut bytes).ok()?).ok()?;
        if len == 0 || len > MAX_LINE_LEN || len > bytes.len() {
            return None;
        }
        let (line, rest) = bytes.split_at(len);
        bytes = rest;

        let line = line.strip_suffix(b"\n")?;
        let line = std::str::from_utf8(line).ok()?;
        if line.chars().any(char::is_control) {
            return None;
        }
        lines.push(line.to_string());
    }

    (!lines.is_empty()).then_some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::multistream_line;

    #[test]
    fn decodes_negotiation() {
        let mut payload = multistream_line("/multistream/1.0.0");
        payload.extend(multistream_line("/eth2/beacon_chain/req/status/1/ssz_snappy"));

        assert_eq!(
            decode_multistream(&payload),
            Some(vec![
                "/multistream/1.0.0".to_string(),
                "/eth2/beacon_chain/req/status/1/ssz_snappy".to_string()
            ])
        );
        assert_eq!(decode_multistream(b"\x03na\n"), Some(vec!["na".to_string()]));
    }

    #[test]
    fn rejects_other_payloads() {
        let line = multistream_line("/multistream/1.0.0");
        assert_eq!(decode_multistream(&line[..line.len() - 1]), None);
        assert_eq!(decode_multistream(b"\x03abc"), None);
        assert_eq!(decode_multistream(b"\x03\x00\x01\n"), None);
        assert_eq!(decode_multistream(b""), None);
    }
}
