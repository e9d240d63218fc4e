use alloy_primitives::B256;
use blst::{
    min_pk::{PublicKey, Signature},
    BLST_ERROR,
};
use sha2::{Digest, Sha256};
use ssz_types::{typenum::U4, BitVector, FixedVector};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use super::{
    constants::{EPOCHS_PER_SYNC_COMMITTEE_PERIOD, SLOTS_PER_EPOCH},
    errors::ConsensusError,
    types::{BlsSignature, SyncCommittee, SyncCommitteeSize},
};

/// Domain separation tag of the proof-of-possession BLS ciphersuite used by the beacon chain.
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

pub fn calc_epoch(slot: u64) -> u64 {
    slot / SLOTS_PER_EPOCH
}

pub fn calc_sync_period(slot: u64) -> u64 {
    calc_epoch(slot) / EPOCHS_PER_SYNC_COMMITTEE_PERIOD
}

pub fn get_bits(bitfield: &BitVector<SyncCommitteeSize>) -> u64 {
    bitfield.iter().filter(|bit| *bit).count() as u64
}

/// Depth of a generalized index, ie. `floor(log2(gindex))`.
pub fn gindex_depth(gindex: u64) -> usize {
    (u64::BITS - 1 - gindex.leading_zeros()) as usize
}

/// Position of a generalized index within its layer.
pub fn gindex_subtree_index(gindex: u64) -> u64 {
    gindex - (1 << gindex_depth(gindex))
}

pub fn merkle_root_from_branch(leaf: B256, branch: &[B256], depth: usize, index: u64) -> B256 {
    let mut value = leaf;
    for (i, node) in branch.iter().take(depth).enumerate() {
        let mut hasher = Sha256::new();
        if (index >> i) & 1 == 1 {
            hasher.update(node);
            hasher.update(value);
        } else {
            hasher.update(value);
            hasher.update(node);
        }
        value = B256::from_slice(&hasher.finalize());
    }
    value
}

/// Checks that `leaf_root` sits at `gindex` of the tree rooted at `state_root`.
///
/// A branch whose length does not match the depth of `gindex` is rejected with an error rather
/// than reported as an invalid proof.
pub fn is_proof_valid(
    state_root: B256,
    leaf_root: B256,
    branch: &[B256],
    gindex: u64,
) -> Result<bool, ConsensusError> {
    let depth = gindex_depth(gindex);
    if branch.len() != depth {
        return Err(ConsensusError::InvalidBranchLength {
            gindex,
            expected: depth,
            actual: branch.len(),
        });
    }

    let root = merkle_root_from_branch(leaf_root, branch, depth, gindex_subtree_index(gindex));
    Ok(root == state_root)
}

#[derive(Debug, TreeHash)]
struct SigningData {
    object_root: B256,
    domain: B256,
}

#[derive(Debug, TreeHash)]
struct ForkData {
    current_version: FixedVector<u8, U4>,
    genesis_validator_root: B256,
}

pub fn compute_signing_root(object_root: B256, domain: B256) -> B256 {
    let data = SigningData {
        object_root,
        domain,
    };
    data.tree_hash_root()
}

pub fn compute_fork_data_root(current_version: [u8; 4], genesis_validator_root: B256) -> B256 {
    let fork_data = ForkData {
        current_version: FixedVector::from(current_version.to_vec()),
        genesis_validator_root,
    };
    fork_data.tree_hash_root()
}

/// The 4-byte digest that tags gossip topics and RPC response chunks.
pub fn compute_fork_digest(current_version: [u8; 4], genesis_validator_root: B256) -> [u8; 4] {
    let root = compute_fork_data_root(current_version, genesis_validator_root);
    let mut digest = [0u8; 4];
    digest.copy_from_slice(&root[..4]);
    digest
}

pub fn compute_domain(
    domain_type: [u8; 4],
    fork_version: [u8; 4],
    genesis_root: B256,
) -> B256 {
    let fork_data_root = compute_fork_data_root(fork_version, genesis_root);
    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(&domain_type);
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    B256::from(domain)
}

pub fn get_participating_keys(
    committee: &SyncCommittee,
    bitfield: &BitVector<SyncCommitteeSize>,
) -> Result<Vec<PublicKey>, ConsensusError> {
    bitfield
        .iter()
        .enumerate()
        .filter(|(_, bit)| *bit)
        .map(|(i, _)| {
            PublicKey::from_bytes(&committee.pubkeys[i].inner[..])
                .map_err(|_| ConsensusError::InvalidPublicKey(i))
        })
        .collect()
}

pub fn is_aggregate_valid(sig_bytes: &BlsSignature, msg: &[u8], pks: &[&PublicKey]) -> bool {
    if pks.is_empty() {
        return false;
    }
    match Signature::from_bytes(&sig_bytes.signature[..]) {
        Ok(sig) => sig.fast_aggregate_verify(true, msg, BLS_DST, pks) == BLST_ERROR::BLST_SUCCESS,
        Err(_) => false,
    }
}
