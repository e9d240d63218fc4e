use thiserror::Error;

use super::types::ForkName;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("insufficient participation")]
    InsufficientParticipation,
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("invalid sync committee period")]
    InvalidPeriod,
    #[error("update not relevant")]
    NotRelevant,
    #[error("invalid finality proof")]
    InvalidFinalityProof,
    #[error("invalid next sync committee proof")]
    InvalidNextSyncCommitteeProof,
    #[error("next sync committee does not match the one in the store")]
    InconsistentNextSyncCommittee,
    #[error("invalid current sync committee proof")]
    InvalidCurrentSyncCommitteeProof,
    #[error("invalid sync committee signature")]
    InvalidSignature,
    #[error("invalid sync committee public key at index {0}")]
    InvalidPublicKey(usize),
    #[error("invalid header hash found: {1}, expected: {0}")]
    InvalidHeaderHash(String, String),
    #[error("invalid finalized header")]
    InvalidFinalizedHeader,
    #[error("branch for gindex {gindex} has {actual} nodes, expected {expected}")]
    InvalidBranchLength {
        gindex: u64,
        expected: usize,
        actual: usize,
    },
    #[error("fork not supported by the light client: {0:?}")]
    UnsupportedFork(Option<ForkName>),
    #[error("checkpoint is too old")]
    CheckpointTooOld,
    #[error("consensus rpc is for the incorrect network")]
    IncorrectRpcNetwork,
}
