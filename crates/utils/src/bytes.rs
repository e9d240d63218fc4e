use thiserror::Error;

/// A error related to hexadecimal string encoding and decoding.
#[derive(Error, Debug)]
pub enum HexError {
    /// A failure to convert a string into a byte vector.
    #[error("Could not decode hex")]
    DecodeError(#[from] hex::FromHexError),
    /// A failure to adhere to the convention that a hex-encoded
    /// string must include the "0x" prefix.
    #[error("Hex strings must start with 0x, but found {0}")]
    PrefixError(String),
}

/// Encode hex with 0x prefix
pub fn hex_encode<T: AsRef<[u8]>>(data: T) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decode hex with 0x prefix
pub fn hex_decode(data: &str) -> Result<Vec<u8>, HexError> {
    match data.strip_prefix("0x") {
        Some(stripped) => hex::decode(stripped).map_err(|e| e.into()),
        None => Err(HexError::PrefixError(data.chars().take(2).collect())),
    }
}

/// Decode hex, tolerating a missing 0x prefix.
pub fn hex_decode_lenient(data: &str) -> Result<Vec<u8>, HexError> {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    Ok(hex::decode(stripped)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hex_encode() {
        let to_encode = vec![176, 15];
        let encoded = hex_encode(to_encode);
        assert_eq!(encoded, "0xb00f");
    }

    #[test]
    fn test_hex_decode() {
        let to_decode = "0xb00f";
        let decoded = hex_decode(to_decode).unwrap();
        assert_eq!(decoded, vec![176, 15]);
    }

    #[test]
    fn test_hex_decode_invalid_start() {
        assert!(hex_decode("b00f").is_err());
        assert!(hex_decode("b").is_err());
    }

    #[test]
    fn test_hex_decode_invalid_char() {
        let to_decode = "0xb00g";
        let result = hex_decode(to_decode);
        assert!(result.is_err());
    }

    #[test]
    fn test_hex_decode_lenient() {
        assert_eq!(hex_decode_lenient("b00f").unwrap(), vec![176, 15]);
        assert_eq!(hex_decode_lenient("0xb00f").unwrap(), vec![176, 15]);
    }
}
