//! Messages of the consensus req/resp protocols small enough to be worth decoding.

use std::fmt;

use alloy_primitives::B256;
use lc_utils::bytes::hex_encode;
use light_client::consensus::types::ForkName;
use ssz_derive::{Decode, Encode};
use ssz_types::{
    typenum::{U4, U64},
    BitVector,
};

pub const MAX_REQUEST_BLOCKS: usize = 1024;
pub const MAX_REQUEST_BLOB_SIDECARS: usize = 768;
pub const MAX_ERROR_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct StatusMessage {
    pub fork_digest: [u8; 4],
    pub finalized_root: B256,
    pub finalized_epoch: u64,
    pub head_root: B256,
    pub head_slot: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Ping {
    pub data: u64,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct MetaDataV1 {
    pub seq_number: u64,
    pub attnets: BitVector<U64>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct MetaDataV2 {
    pub seq_number: u64,
    pub attnets: BitVector<U64>,
    pub syncnets: BitVector<U4>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct BlocksByRangeRequest {
    pub start_slot: u64,
    pub count: u64,
    pub step: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct BlobsByRangeRequest {
    pub start_slot: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct BlobIdentifier {
    pub block_root: B256,
    pub index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct LightClientUpdatesByRangeRequest {
    pub start_period: u64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    Status(StatusMessage),
    Goodbye(u64),
    BlocksByRange(BlocksByRangeRequest),
    BlocksByRoot(Vec<B256>),
    Ping(Ping),
    BlobsByRange(BlobsByRangeRequest),
    BlobsByRoot(Vec<BlobIdentifier>),
    LightClientBootstrap(B256),
    LightClientUpdatesByRange(LightClientUpdatesByRangeRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaData {
    V1(MetaDataV1),
    V2(MetaDataV2),
}

/// Result codes of a response chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    InvalidRequest,
    ServerError,
    ResourceUnavailable,
    RateLimited,
}

impl RpcErrorCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::InvalidRequest),
            2 => Some(Self::ServerError),
            3 => Some(Self::ResourceUnavailable),
            139 => Some(Self::RateLimited),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcResponse {
    Status(StatusMessage),
    Pong(Ping),
    MetaData(MetaData),
    /// A payload that is only measured, such as a block or a light client update.
    Ssz {
        fork: Option<ForkName>,
        len: usize,
    },
    Error {
        code: RpcErrorCode,
        message: String,
    },
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status {{ fork_digest: {}, finalized_root: {}, finalized_epoch: {}, head_root: {}, head_slot: {} }}",
            hex_encode(self.fork_digest),
            self.finalized_root,
            self.finalized_epoch,
            self.head_root,
            self.head_slot
        )
    }
}

impl fmt::Display for RpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Goodbye(reason) => write!(f, "Goodbye {{ reason: {reason} }}"),
            Self::BlocksByRange(request) => write!(
                f,
                "BlocksByRange {{ start_slot: {}, count: {} }}",
                request.start_slot, request.count
            ),
            Self::BlocksByRoot(roots) => write!(f, "BlocksByRoot {{ roots: {} }}", roots.len()),
            Self::Ping(ping) => write!(f, "Ping {{ data: {} }}", ping.data),
            Self::BlobsByRange(request) => write!(
                f,
                "BlobsByRange {{ start_slot: {}, count: {} }}",
                request.start_slot, request.count
            ),
            Self::BlobsByRoot(ids) => write!(f, "BlobsByRoot {{ ids: {} }}", ids.len()),
            Self::LightClientBootstrap(root) => {
                write!(f, "LightClientBootstrap {{ root: {root} }}")
            }
            Self::LightClientUpdatesByRange(request) => write!(
                f,
                "LightClientUpdatesByRange {{ start_period: {}, count: {} }}",
                request.start_period, request.count
            ),
        }
    }
}

impl fmt::Display for RpcResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Pong(ping) => write!(f, "Pong {{ data: {} }}", ping.data),
            Self::MetaData(MetaData::V1(metadata)) => write!(
                f,
                "MetaData {{ seq_number: {}, attnets: {} }}",
                metadata.seq_number,
                metadata.attnets.num_set_bits()
            ),
            Self::MetaData(MetaData::V2(metadata)) => write!(
                f,
                "MetaData {{ seq_number: {}, attnets: {}, syncnets: {} }}",
                metadata.seq_number,
                metadata.attnets.num_set_bits(),
                metadata.syncnets.num_set_bits()
            ),
            Self::Ssz { fork, len } => match fork {
                Some(fork) => write!(f, "{fork} payload of {len} bytes"),
                None => write!(f, "payload of {len} bytes"),
            },
            Self::Error { code, message } => write!(f, "{code:?}: {message}"),
        }
    }
}
