//! Gossipsub RPC frames and the consensus gossip topics carried in them.

use std::{fmt, str::FromStr};

use prost::{encoding::decode_varint, Message};
use snap::raw::{decompress_len, Decoder};
use thiserror::Error;
use tracing::debug;

use crate::MAX_PAYLOAD_SIZE;

/// Protobuf schema of the gossipsub v1.2 RPC.
pub mod proto {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Rpc {
        #[prost(message, repeated, tag = "1")]
        pub subscriptions: Vec<SubOpts>,
        #[prost(message, repeated, tag = "2")]
        pub publish: Vec<RawMessage>,
        #[prost(message, optional, tag = "3")]
        pub control: Option<ControlMessage>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SubOpts {
        #[prost(bool, optional, tag = "1")]
        pub subscribe: Option<bool>,
        #[prost(string, optional, tag = "2")]
        pub topic_id: Option<String>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct RawMessage {
        #[prost(bytes = "vec", optional, tag = "1")]
        pub from: Option<Vec<u8>>,
        #[prost(bytes = "vec", optional, tag = "2")]
        pub data: Option<Vec<u8>>,
        #[prost(bytes = "vec", optional, tag = "3")]
        pub seqno: Option<Vec<u8>>,
        #[prost(string, required, tag = "4")]
        pub topic: String,
        #[prost(bytes = "vec", optional, tag = "5")]
        pub signature: Option<Vec<u8>>,
        #[prost(bytes = "vec", optional, tag = "6")]
        pub key: Option<Vec<u8>>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ControlMessage {
        #[prost(message, repeated, tag = "1")]
        pub ihave: Vec<ControlIHave>,
        #[prost(message, repeated, tag = "2")]
        pub iwant: Vec<ControlIWant>,
        #[prost(message, repeated, tag = "3")]
        pub graft: Vec<ControlGraft>,
        #[prost(message, repeated, tag = "4")]
        pub prune: Vec<ControlPrune>,
        #[prost(message, repeated, tag = "5")]
        pub idontwant: Vec<ControlIDontWant>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ControlIHave {
        #[prost(string, optional, tag = "1")]
        pub topic_id: Option<String>,
        #[prost(bytes = "vec", repeated, tag = "2")]
        pub message_ids: Vec<Vec<u8>>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ControlIWant {
        #[prost(bytes = "vec", repeated, tag = "1")]
        pub message_ids: Vec<Vec<u8>>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ControlGraft {
        #[prost(string, optional, tag = "1")]
        pub topic_id: Option<String>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ControlPrune {
        #[prost(string, optional, tag = "1")]
        pub topic_id: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub peers: Vec<PeerInfo>,
        #[prost(uint64, optional, tag = "3")]
        pub backoff: Option<u64>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PeerInfo {
        #[prost(bytes = "vec", optional, tag = "1")]
        pub peer_id: Option<Vec<u8>>,
        #[prost(bytes = "vec", optional, tag = "2")]
        pub signed_peer_record: Option<Vec<u8>>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ControlIDontWant {
        #[prost(bytes = "vec", repeated, tag = "1")]
        pub message_ids: Vec<Vec<u8>>,
    }

    impl ControlMessage {
        pub fn len(&self) -> usize {
            self.ihave.len()
                + self.iwant.len()
                + self.graft.len()
                + self.prune.len()
                + self.idontwant.len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }
}

const TOPIC_PREFIX: &str = "eth2";
const SSZ_SNAPPY_ENCODING: &str = "ssz_snappy";

#[derive(Error, Debug)]
pub enum GossipError {
    #[error("invalid frame length prefix")]
    InvalidLengthPrefix,
    #[error("frame of {len} bytes but only {available} available")]
    Truncated { len: usize, available: usize },
    #[error("{0} bytes exceed the gossip size limit")]
    TooLarge(usize),
    #[error("protobuf decoding failed: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("snappy decoding failed: {0}")]
    Snappy(#[from] snap::Error),
    #[error("invalid topic {0}")]
    InvalidTopic(String),
    #[error("gossipsub rpc carries nothing")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GossipKind {
    BeaconBlock,
    BeaconAggregateAndProof,
    Attestation(u64),
    VoluntaryExit,
    ProposerSlashing,
    AttesterSlashing,
    SignedContributionAndProof,
    SyncCommitteeMessage(u64),
    BlsToExecutionChange,
    LightClientFinalityUpdate,
    LightClientOptimisticUpdate,
    BlobSidecar(u64),
}

impl FromStr for GossipKind {
    type Err = GossipError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        let subnet = |prefix: &str| -> Option<u64> { kind.strip_prefix(prefix)?.parse().ok() };

        let kind = match kind {
            "beacon_block" => Self::BeaconBlock,
            "beacon_aggregate_and_proof" => Self::BeaconAggregateAndProof,
            "voluntary_exit" => Self::VoluntaryExit,
            "proposer_slashing" => Self::ProposerSlashing,
            "attester_slashing" => Self::AttesterSlashing,
            "sync_committee_contribution_and_proof" => Self::SignedContributionAndProof,
            "bls_to_execution_change" => Self::BlsToExecutionChange,
            "light_client_finality_update" => Self::LightClientFinalityUpdate,
            "light_client_optimistic_update" => Self::LightClientOptimisticUpdate,
            _ => {
                if let Some(subnet) = subnet("beacon_attestation_") {
                    Self::Attestation(subnet)
                } else if let Some(subnet) = subnet("sync_committee_") {
                    Self::SyncCommitteeMessage(subnet)
                } else if let Some(subnet) = subnet("blob_sidecar_") {
                    Self::BlobSidecar(subnet)
                } else {
                    return Err(GossipError::InvalidTopic(kind.to_string()));
                }
            }
        };
        Ok(kind)
    }
}

impl fmt::Display for GossipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeaconBlock => f.write_str("beacon_block"),
            Self::BeaconAggregateAndProof => f.write_str("beacon_aggregate_and_proof"),
            Self::Attestation(subnet) => write!(f, "beacon_attestation_{subnet}"),
            Self::VoluntaryExit => f.write_str("voluntary_exit"),
            Self::ProposerSlashing => f.write_str("proposer_slashing"),
            Self::AttesterSlashing => f.write_str("attester_slashing"),
            Self::SignedContributionAndProof => {
                f.write_str("sync_committee_contribution_and_proof")
            }
            Self::SyncCommitteeMessage(subnet) => write!(f, "sync_committee_{subnet}"),
            Self::BlsToExecutionChange => f.write_str("bls_to_execution_change"),
            Self::LightClientFinalityUpdate => f.write_str("light_client_finality_update"),
            Self::LightClientOptimisticUpdate => f.write_str("light_client_optimistic_update"),
            Self::BlobSidecar(subnet) => write!(f, "blob_sidecar_{subnet}"),
        }
    }
}

/// `/eth2/<fork_digest>/<kind>/ssz_snappy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GossipTopic {
    pub fork_digest: [u8; 4],
    pub kind: GossipKind,
}

impl GossipTopic {
    pub fn decode(topic: &str) -> Result<Self, GossipError> {
        let invalid = || GossipError::InvalidTopic(topic.to_string());

        let parts: Vec<&str> = topic.split('/').collect();
        let ["", TOPIC_PREFIX, digest, kind, SSZ_SNAPPY_ENCODING] = parts.as_slice() else {
            return Err(invalid());
        };
        let fork_digest: [u8; 4] = hex::decode(digest)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(invalid)?;
        let kind = kind.parse().map_err(|_| invalid())?;

        Ok(Self { fork_digest, kind })
    }
}

impl fmt::Display for GossipTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{TOPIC_PREFIX}/{}/{}/{SSZ_SNAPPY_ENCODING}",
            hex::encode(self.fork_digest),
            self.kind
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipMessage {
    pub topic: GossipTopic,
    /// Decompressed SSZ payload.
    pub data: Vec<u8>,
}

/// The parts of one or more gossipsub RPC frames worth reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedGossip {
    pub subscriptions: Vec<(bool, String)>,
    pub messages: Vec<GossipMessage>,
    pub control_messages: usize,
}

impl DecodedGossip {
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.messages.is_empty() && self.control_messages == 0
    }
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, GossipError> {
    let len = decompress_len(data)?;
    if len > MAX_PAYLOAD_SIZE {
        return Err(GossipError::TooLarge(len));
    }
    Ok(Decoder::new().decompress_vec(data)?)
}

fn decode_message(message: proto::RawMessage) -> Result<GossipMessage, GossipError> {
    let topic = GossipTopic::decode(&message.topic)?;
    let data = decompress(message.data.as_deref().unwrap_or_default())?;
    Ok(GossipMessage { topic, data })
}

/// Decodes the varint length prefixed gossipsub RPC frames that make up `payload`.
pub fn decode_gossip(payload: &[u8]) -> Result<DecodedGossip, GossipError> {
    let mut bytes = payload;
    let mut decoded = DecodedGossip::default();

    while !bytes.is_empty() {
        let len = decode_varint(&mut bytes).map_err(|_| GossipError::InvalidLengthPrefix)?;
        let len = usize::try_from(len).map_err(|_| GossipError::TooLarge(usize::MAX))?;
        if len > MAX_PAYLOAD_SIZE {
            return Err(GossipError::TooLarge(len));
        }
        if len > bytes.len() {
            return Err(GossipError::Truncated {
                len,
                available: bytes.len(),
            });
        }
        let (frame, rest) = bytes.split_at(len);
        bytes = rest;

        let rpc = proto::Rpc::decode(frame)?;
        decoded.subscriptions.extend(rpc.subscriptions.into_iter().filter_map(|sub| {
            sub.topic_id
                .map(|topic| (sub.subscribe.unwrap_or_default(), topic))
        }));
        decoded.control_messages += rpc.control.map(|control| control.len()).unwrap_or_default();

        for message in rpc.publish {
            let topic = message.topic.clone();
            match decode_message(message) {
                Ok(message) => decoded.messages.push(message),
                Err(err) => debug!(%topic, error = %err, "skipping gossip message"),
            }
        }
    }

    if decoded.is_empty() {
        return Err(GossipError::Empty);
    }
    Ok(decoded)
}
