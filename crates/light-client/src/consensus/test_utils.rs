//! Fixtures that produce bootstraps and updates signed by real BLS keys, with state roots that
//! commit to the proven fields.

use std::collections::HashMap;

use alloy_primitives::{FixedBytes, B256};
use blst::min_pk::{AggregateSignature, SecretKey, Signature};
use sha2::{Digest, Sha256};
use ssz_types::{BitVector, FixedVector};
use tree_hash::TreeHash;

use super::{
    constants::{
        CURRENT_SYNC_COMMITTEE_GINDEX, DOMAIN_SYNC_COMMITTEE, FINALIZED_ROOT_GINDEX,
        NEXT_SYNC_COMMITTEE_GINDEX, SYNC_COMMITTEE_SIZE,
    },
    types::{
        BeaconBlockHeader, BlsSignature, GenericUpdate, LightClientBootstrap,
        LightClientFinalityUpdate, LightClientOptimisticUpdate, LightClientUpdate, PubKey,
        SyncAggregate, SyncCommittee,
    },
    utils::{compute_domain, compute_signing_root, gindex_depth, BLS_DST},
};
use crate::config::{ChainConfig, Fork, Forks};

const DISTINCT_KEYS: usize = 4;

pub fn genesis_root() -> B256 {
    B256::repeat_byte(0x42)
}

/// Every fork up to Deneb active from genesis.
pub fn test_forks() -> Forks {
    let fork = |version: u8| Fork {
        epoch: 0,
        fork_version: FixedBytes::from([version, 0, 0, 1]),
    };
    Forks {
        genesis: fork(0),
        altair: fork(1),
        bellatrix: fork(2),
        capella: fork(3),
        deneb: fork(4),
        electra: Fork::default(),
    }
}

pub fn test_chain() -> ChainConfig {
    ChainConfig {
        chain_id: 1337,
        genesis_time: 1_700_000_000,
        genesis_root: genesis_root(),
        seconds_per_slot: 12,
    }
}

pub fn header(slot: u64) -> BeaconBlockHeader {
    BeaconBlockHeader {
        slot,
        proposer_index: slot % 1000,
        parent_root: B256::repeat_byte(1),
        state_root: B256::left_padding_from(&slot.to_be_bytes()),
        body_root: B256::repeat_byte(2),
    }
}

/// A sparse `BeaconState`-shaped tree. Subtrees without any leaf hash to zero.
struct StateTree {
    leaves: HashMap<u64, B256>,
}

impl StateTree {
    fn new(leaves: &[(u64, B256)]) -> Self {
        Self {
            leaves: leaves.iter().copied().collect(),
        }
    }

    fn is_ancestor(node: u64, leaf: u64) -> bool {
        let node_depth = gindex_depth(node);
        let leaf_depth = gindex_depth(leaf);
        leaf_depth >= node_depth && (leaf >> (leaf_depth - node_depth)) == node
    }

    fn node(&self, gindex: u64) -> B256 {
        if let Some(leaf) = self.leaves.get(&gindex) {
            return *leaf;
        }
        if !self
            .leaves
            .keys()
            .any(|leaf| Self::is_ancestor(gindex, *leaf))
        {
            return B256::ZERO;
        }
        let mut hasher = Sha256::new();
        hasher.update(self.node(gindex * 2));
        hasher.update(self.node(gindex * 2 + 1));
        B256::from_slice(&hasher.finalize())
    }

    fn root(&self) -> B256 {
        self.node(1)
    }

    fn branch(&self, gindex: u64) -> Vec<B256> {
        let mut branch = vec![];
        let mut node = gindex;
        while node > 1 {
            branch.push(self.node(node ^ 1));
            node /= 2;
        }
        branch
    }
}

/// A sync committee backed by a handful of secret keys repeated across all 512 seats.
pub struct TestCommittee {
    keys: Vec<SecretKey>,
    pub committee: SyncCommittee,
}

impl TestCommittee {
    pub fn new(seed: u8) -> Self {
        let keys: Vec<SecretKey> = (0..DISTINCT_KEYS)
            .map(|i| {
                let mut ikm = [0x5a; 32];
                ikm[0] = seed;
                ikm[1] = i as u8;
                SecretKey::key_gen(&ikm, &[]).unwrap()
            })
            .collect();
        let pubkeys: Vec<PubKey> = (0..SYNC_COMMITTEE_SIZE as usize)
            .map(|i| {
                PubKey::try_from(keys[i % DISTINCT_KEYS].sk_to_pk().compress().as_slice()).unwrap()
            })
            .collect();
        let committee = SyncCommittee {
            aggregate_pubkey: pubkeys[0].clone(),
            pubkeys: FixedVector::from(pubkeys),
        };
        Self { keys, committee }
    }

    /// Signs `attested` with the first `participants` seats of the committee.
    pub fn sign(
        &self,
        attested: &BeaconBlockHeader,
        signature_slot: u64,
        participants: usize,
    ) -> SyncAggregate {
        let fork_version = test_forks().fork_version(signature_slot.max(1) - 1);
        let domain = compute_domain(DOMAIN_SYNC_COMMITTEE, fork_version.0, genesis_root());
        let signing_root = compute_signing_root(attested.tree_hash_root(), domain);

        let mut sync_committee_bits = BitVector::new();
        for i in 0..participants {
            sync_committee_bits.set(i, true).unwrap();
        }

        let sync_committee_signature = if participants == 0 {
            BlsSignature::default()
        } else {
            let signatures: Vec<Signature> = self
                .keys
                .iter()
                .map(|sk| sk.sign(signing_root.as_slice(), BLS_DST, &[]))
                .collect();
            let seats: Vec<&Signature> = (0..participants)
                .map(|i| &signatures[i % DISTINCT_KEYS])
                .collect();
            let aggregate = AggregateSignature::aggregate(&seats, false)
                .unwrap()
                .to_signature();
            BlsSignature::try_from(aggregate.compress().as_slice()).unwrap()
        };

        SyncAggregate {
            sync_committee_bits,
            sync_committee_signature,
        }
    }

    /// Returns the trusted block root and its bootstrap.
    pub fn bootstrap(&self, slot: u64) -> (B256, LightClientBootstrap) {
        let tree = StateTree::new(&[(
            CURRENT_SYNC_COMMITTEE_GINDEX,
            self.committee.tree_hash_root(),
        )]);
        let header = BeaconBlockHeader {
            state_root: tree.root(),
            ..header(slot)
        };

        let bootstrap = LightClientBootstrap {
            header: header.clone().into(),
            current_sync_committee: self.committee.clone(),
            current_sync_committee_branch: tree.branch(CURRENT_SYNC_COMMITTEE_GINDEX),
        };
        (header.tree_hash_root(), bootstrap)
    }

    /// Builds an update whose attested state commits to `finalized` and `next_committee`.
    pub fn update(
        &self,
        attested_slot: u64,
        signature_slot: u64,
        finalized: Option<&BeaconBlockHeader>,
        next_committee: Option<&SyncCommittee>,
        participants: usize,
    ) -> GenericUpdate {
        let mut leaves = vec![];
        if let Some(finalized) = finalized {
            let finalized_root = if finalized.slot == 0 {
                B256::ZERO
            } else {
                finalized.tree_hash_root()
            };
            leaves.push((FINALIZED_ROOT_GINDEX, finalized_root));
        }
        if let Some(committee) = next_committee {
            leaves.push((NEXT_SYNC_COMMITTEE_GINDEX, committee.tree_hash_root()));
        }
        let tree = StateTree::new(&leaves);

        let attested_header = BeaconBlockHeader {
            state_root: tree.root(),
            ..header(attested_slot)
        };
        let sync_aggregate = self.sign(&attested_header, signature_slot, participants);

        GenericUpdate {
            attested_header,
            sync_aggregate,
            signature_slot,
            next_sync_committee: next_committee.cloned(),
            next_sync_committee_branch: next_committee
                .map(|_| tree.branch(NEXT_SYNC_COMMITTEE_GINDEX)),
            finalized_header: finalized.cloned(),
            finality_branch: finalized.map(|_| tree.branch(FINALIZED_ROOT_GINDEX)),
        }
    }
}

/// The beacon API shape of a full update; absent parts become zero branches.
pub fn to_light_client_update(update: &GenericUpdate) -> LightClientUpdate {
    LightClientUpdate {
        attested_header: update.attested_header.clone().into(),
        next_sync_committee: update.next_sync_committee.clone().unwrap_or_default(),
        next_sync_committee_branch: update
            .next_sync_committee_branch
            .clone()
            .unwrap_or_else(|| vec![B256::ZERO; gindex_depth(NEXT_SYNC_COMMITTEE_GINDEX)]),
        finalized_header: update.finalized_header.clone().unwrap_or_default().into(),
        finality_branch: update
            .finality_branch
            .clone()
            .unwrap_or_else(|| vec![B256::ZERO; gindex_depth(FINALIZED_ROOT_GINDEX)]),
        sync_aggregate: update.sync_aggregate.clone(),
        signature_slot: update.signature_slot,
    }
}

pub fn to_finality_update(update: &GenericUpdate) -> LightClientFinalityUpdate {
    LightClientFinalityUpdate {
        attested_header: update.attested_header.clone().into(),
        finalized_header: update.finalized_header.clone().unwrap_or_default().into(),
        finality_branch: update.finality_branch.clone().unwrap_or_default(),
        sync_aggregate: update.sync_aggregate.clone(),
        signature_slot: update.signature_slot,
    }
}

pub fn to_optimistic_update(update: &GenericUpdate) -> LightClientOptimisticUpdate {
    LightClientOptimisticUpdate {
        attested_header: update.attested_header.clone().into(),
        sync_aggregate: update.sync_aggregate.clone(),
        signature_slot: update.signature_slot,
    }
}
