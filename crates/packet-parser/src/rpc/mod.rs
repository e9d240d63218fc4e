//! Req/resp framing of the consensus p2p interface.
//!
//! A request is `<varint ssz length><snappy frames>`. Every response chunk is preceded by a
//! result byte and, for fork aware protocols, by the 4 byte fork digest of its payload.

pub mod methods;
pub mod protocol;

use std::io::{self, Read};

use alloy_primitives::B256;
use prost::encoding::decode_varint;
use snap::{raw::decompress_len, read::FrameDecoder};
use ssz::Decode;
use thiserror::Error;
use tracing::debug;

use self::{
    methods::{
        BlobIdentifier, BlobsByRangeRequest, BlocksByRangeRequest,
        LightClientUpdatesByRangeRequest, MetaData, MetaDataV1, MetaDataV2, Ping, RpcErrorCode,
        RpcRequest, RpcResponse, StatusMessage,
    },
    protocol::{SszLimits, SupportedProtocol},
};
use crate::{fork_digest::ForkDigests, MAX_PAYLOAD_SIZE};

const SUCCESS: u8 = 0;

#[derive(Error, Debug)]
pub enum RpcDecodeError {
    #[error("unexpected end of payload")]
    UnexpectedEnd,
    #[error("invalid length prefix")]
    InvalidLengthPrefix,
    #[error("length prefix is {expected} but the frames decode to {decoded} bytes")]
    LengthMismatch { expected: usize, decoded: usize },
    #[error("message of {0} bytes exceeds the maximum payload size")]
    TooLarge(usize),
    #[error("length {len} is out of bounds for {protocol}")]
    OutOfBounds {
        protocol: SupportedProtocol,
        len: usize,
    },
    #[error("{0} has no request body")]
    NoRequestBody(SupportedProtocol),
    #[error("{0} has no responses")]
    NoResponse(SupportedProtocol),
    #[error("snappy decoding failed: {0}")]
    Snappy(#[from] io::Error),
    #[error("ssz decoding failed: {0:?}")]
    Ssz(ssz::DecodeError),
    #[error("unknown context bytes {0:?}")]
    UnknownContext([u8; 4]),
    #[error("invalid response code {0}")]
    InvalidResponseCode(u8),
    #[error("error message is not utf-8")]
    InvalidErrorMessage,
    #[error("{0} bytes left after the request")]
    TrailingBytes(usize),
}

fn from_ssz<T: Decode>(bytes: &[u8]) -> Result<T, RpcDecodeError> {
    T::from_ssz_bytes(bytes).map_err(RpcDecodeError::Ssz)
}

const STREAM_IDENTIFIER: u8 = 0xff;
const COMPRESSED_CHUNK: u8 = 0x00;
const UNCOMPRESSED_CHUNK: u8 = 0x01;
const CHUNK_CRC_SIZE: usize = 4;

fn truncated_frame() -> RpcDecodeError {
    RpcDecodeError::Snappy(io::ErrorKind::UnexpectedEof.into())
}

/// Walks snappy frame chunk headers from the front of `bytes` until `len` bytes of data are
/// covered, returning the size of those frames. A zero length body may be empty or carry only the
/// stream identifier.
fn frames_len(bytes: &[u8], len: usize) -> Result<usize, RpcDecodeError> {
    let mut pos = 0;
    let mut decoded = 0usize;
    while decoded < len || (pos == 0 && bytes.first() == Some(&STREAM_IDENTIFIER)) {
        let header = bytes.get(pos..pos + 4).ok_or_else(truncated_frame)?;
        let chunk_len = usize::from(header[1])
            | usize::from(header[2]) << 8
            | usize::from(header[3]) << 16;
        let body = bytes
            .get(pos + 4..pos + 4 + chunk_len)
            .ok_or_else(truncated_frame)?;

        let data_len = match header[0] {
            COMPRESSED_CHUNK => {
                let compressed = body.get(CHUNK_CRC_SIZE..).ok_or_else(truncated_frame)?;
                decompress_len(compressed).map_err(io::Error::from)?
            }
            UNCOMPRESSED_CHUNK => body
                .len()
                .checked_sub(CHUNK_CRC_SIZE)
                .ok_or_else(truncated_frame)?,
            _ => 0,
        };
        decoded = decoded.saturating_add(data_len);
        pos += 4 + chunk_len;
    }

    if decoded != len {
        return Err(RpcDecodeError::LengthMismatch {
            expected: len,
            decoded,
        });
    }
    Ok(pos)
}

/// Reads one length prefixed snappy frame stream from the front of `bytes`. The frames must
/// decode to exactly the prefixed length.
fn read_ssz_snappy(
    bytes: &mut &[u8],
    limits: SszLimits,
    protocol: SupportedProtocol,
) -> Result<Vec<u8>, RpcDecodeError> {
    let len = decode_varint(bytes).map_err(|_| RpcDecodeError::InvalidLengthPrefix)?;
    let len = usize::try_from(len).map_err(|_| RpcDecodeError::TooLarge(usize::MAX))?;
    if len > MAX_PAYLOAD_SIZE {
        return Err(RpcDecodeError::TooLarge(len));
    }
    if !limits.contains(len) {
        return Err(RpcDecodeError::OutOfBounds { protocol, len });
    }

    let current: &[u8] = *bytes;
    let (frames, rest) = current.split_at(frames_len(current, len)?);
    let mut ssz = Vec::with_capacity(len);
    FrameDecoder::new(frames).read_to_end(&mut ssz)?;
    if ssz.len() != len {
        return Err(RpcDecodeError::LengthMismatch {
            expected: len,
            decoded: ssz.len(),
        });
    }

    *bytes = rest;
    Ok(ssz)
}

pub fn decode_request(
    protocol: SupportedProtocol,
    payload: &[u8],
) -> Result<RpcRequest, RpcDecodeError> {
    let limits = protocol
        .request_limits()
        .ok_or(RpcDecodeError::NoRequestBody(protocol))?;
    let mut bytes = payload;
    let ssz = read_ssz_snappy(&mut bytes, limits, protocol)?;
    if !bytes.is_empty() {
        return Err(RpcDecodeError::TrailingBytes(bytes.len()));
    }

    let request = match protocol {
        SupportedProtocol::StatusV1 => RpcRequest::Status(from_ssz::<StatusMessage>(&ssz)?),
        SupportedProtocol::GoodbyeV1 => RpcRequest::Goodbye(from_ssz::<u64>(&ssz)?),
        SupportedProtocol::BlocksByRangeV1 | SupportedProtocol::BlocksByRangeV2 => {
            RpcRequest::BlocksByRange(from_ssz::<BlocksByRangeRequest>(&ssz)?)
        }
        SupportedProtocol::BlocksByRootV1 | SupportedProtocol::BlocksByRootV2 => {
            RpcRequest::BlocksByRoot(from_ssz::<Vec<B256>>(&ssz)?)
        }
        SupportedProtocol::PingV1 => RpcRequest::Ping(from_ssz::<Ping>(&ssz)?),
        SupportedProtocol::BlobsByRangeV1 => {
            RpcRequest::BlobsByRange(from_ssz::<BlobsByRangeRequest>(&ssz)?)
        }
        SupportedProtocol::BlobsByRootV1 => {
            RpcRequest::BlobsByRoot(from_ssz::<Vec<BlobIdentifier>>(&ssz)?)
        }
        SupportedProtocol::LightClientBootstrapV1 => {
            RpcRequest::LightClientBootstrap(from_ssz::<B256>(&ssz)?)
        }
        SupportedProtocol::LightClientUpdatesByRangeV1 => RpcRequest::LightClientUpdatesByRange(
            from_ssz::<LightClientUpdatesByRangeRequest>(&ssz)?,
        ),
        SupportedProtocol::MetaDataV1
        | SupportedProtocol::MetaDataV2
        | SupportedProtocol::LightClientFinalityUpdateV1
        | SupportedProtocol::LightClientOptimisticUpdateV1 => {
            return Err(RpcDecodeError::NoRequestBody(protocol))
        }
    };
    Ok(request)
}

fn decode_response_chunk(
    protocol: SupportedProtocol,
    limits: SszLimits,
    bytes: &mut &[u8],
    fork_digests: &ForkDigests,
) -> Result<RpcResponse, RpcDecodeError> {
    let (&code, rest) = bytes.split_first().ok_or(RpcDecodeError::UnexpectedEnd)?;
    *bytes = rest;

    if code != SUCCESS {
        let code = RpcErrorCode::from_u8(code).ok_or(RpcDecodeError::InvalidResponseCode(code))?;
        let message = read_ssz_snappy(bytes, SupportedProtocol::error_limits(), protocol)?;
        let message = String::from_utf8(message).map_err(|_| RpcDecodeError::InvalidErrorMessage)?;
        return Ok(RpcResponse::Error { code, message });
    }

    let fork = if protocol.has_context_bytes() {
        let (digest, rest) = bytes
            .split_first_chunk::<4>()
            .ok_or(RpcDecodeError::UnexpectedEnd)?;
        *bytes = rest;
        let fork = fork_digests
            .fork_name(*digest)
            .ok_or(RpcDecodeError::UnknownContext(*digest))?;
        Some(fork)
    } else {
        None
    };

    let ssz = read_ssz_snappy(bytes, limits, protocol)?;
    let response = match protocol {
        SupportedProtocol::StatusV1 => RpcResponse::Status(from_ssz::<StatusMessage>(&ssz)?),
        SupportedProtocol::PingV1 => RpcResponse::Pong(from_ssz::<Ping>(&ssz)?),
        SupportedProtocol::MetaDataV1 => {
            RpcResponse::MetaData(MetaData::V1(from_ssz::<MetaDataV1>(&ssz)?))
        }
        SupportedProtocol::MetaDataV2 => {
            RpcResponse::MetaData(MetaData::V2(from_ssz::<MetaDataV2>(&ssz)?))
        }
        _ => RpcResponse::Ssz {
            fork,
            len: ssz.len(),
        },
    };
    Ok(response)
}

/// Decodes the response chunks in `payload`. A chunk cut off by the end of the segment ends the
/// list; the first chunk must decode.
pub fn decode_response(
    protocol: SupportedProtocol,
    payload: &[u8],
    fork_digests: &ForkDigests,
) -> Result<Vec<RpcResponse>, RpcDecodeError> {
    let limits = protocol
        .response_limits()
        .ok_or(RpcDecodeError::NoResponse(protocol))?;

    let mut bytes = payload;
    let mut responses = vec![];
    while !bytes.is_empty() {
        match decode_response_chunk(protocol, limits, &mut bytes, fork_digests) {
            Ok(response) => responses.push(response),
            Err(err) if responses.is_empty() => return Err(err),
            Err(err) => {
                debug!(%protocol, error = %err, chunks = responses.len(), "stopped decoding response chunks");
                break;
            }
        }
    }

    if responses.is_empty() {
        return Err(RpcDecodeError::UnexpectedEnd);
    }
    Ok(responses)
}

/// Tries every protocol in order and returns the first request that decodes.
pub fn decode_any_request(
    protocols: &[SupportedProtocol],
    payload: &[u8],
) -> Option<(SupportedProtocol, RpcRequest)> {
    protocols.iter().find_map(|protocol| {
        decode_request(*protocol, payload)
            .ok()
            .map(|request| (*protocol, request))
    })
}

/// Tries every protocol in order and returns the first response that decodes.
pub fn decode_any_response(
    protocols: &[SupportedProtocol],
    payload: &[u8],
    fork_digests: &ForkDigests,
) -> Option<(SupportedProtocol, Vec<RpcResponse>)> {
    protocols.iter().find_map(|protocol| {
        decode_response(*protocol, payload, fork_digests)
            .ok()
            .map(|responses| (*protocol, responses))
    })
}
