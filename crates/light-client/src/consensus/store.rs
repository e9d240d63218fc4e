use std::cmp;

use alloy_primitives::B256;
use tree_hash::TreeHash;

use super::{
    errors::ConsensusError,
    types::{BeaconBlockHeader, ForkName, GenericUpdate, LightClientBootstrap, SyncCommittee},
    utils::{calc_sync_period, is_proof_valid},
};

/// Object to store the light client state.
///
/// https://github.com/ethereum/consensus-specs/blob/dev/specs/altair/light-client/sync-protocol.md#lightclientstore
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightClientStore {
    /// Header that is finalized
    pub finalized_header: BeaconBlockHeader,
    /// Sync committees corresponding to the finalized header
    pub current_sync_committee: SyncCommittee,
    pub next_sync_committee: Option<SyncCommittee>,
    /// Best available header to switch finalized head to if we see nothing else
    pub best_valid_update: Option<GenericUpdate>,
    /// Most recent available reasonably-safe header
    pub optimistic_header: BeaconBlockHeader,
    /// Max number of active participants in a sync committee (used to calculate safety threshold)
    pub previous_max_active_participants: u64,
    pub current_max_active_participants: u64,
}

/// Initializes a new `LightClientStore` from a `LightClientBootstrap` fetched for
/// `trusted_block_root`.
///
/// https://github.com/ethereum/consensus-specs/blob/dev/specs/altair/light-client/sync-protocol.md#initialize_light_client_store
pub fn initialize_light_client_store(
    trusted_block_root: B256,
    bootstrap: &LightClientBootstrap,
    fork: ForkName,
) -> Result<LightClientStore, ConsensusError> {
    if !fork.supports_light_client() {
        return Err(ConsensusError::UnsupportedFork(Some(fork)));
    }

    let header = &bootstrap.header.beacon;
    let header_root = header.tree_hash_root();
    if header_root != trusted_block_root {
        return Err(ConsensusError::InvalidHeaderHash(
            trusted_block_root.to_string(),
            header_root.to_string(),
        ));
    }

    let committee_valid = is_proof_valid(
        header.state_root,
        bootstrap.current_sync_committee.tree_hash_root(),
        &bootstrap.current_sync_committee_branch,
        fork.current_sync_committee_gindex(),
    )?;
    if !committee_valid {
        return Err(ConsensusError::InvalidCurrentSyncCommitteeProof);
    }

    Ok(LightClientStore {
        finalized_header: header.clone(),
        current_sync_committee: bootstrap.current_sync_committee.clone(),
        next_sync_committee: None,
        best_valid_update: None,
        optimistic_header: header.clone(),
        previous_max_active_participants: 0,
        current_max_active_participants: 0,
    })
}

impl LightClientStore {
    pub fn finalized_period(&self) -> u64 {
        calc_sync_period(self.finalized_header.slot)
    }

    pub fn optimistic_period(&self) -> u64 {
        calc_sync_period(self.optimistic_header.slot)
    }

    pub fn is_next_sync_committee_known(&self) -> bool {
        self.next_sync_committee.is_some()
    }

    pub fn safety_threshold(&self) -> u64 {
        cmp::max(
            self.current_max_active_participants,
            self.previous_max_active_participants,
        ) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::test_utils::TestCommittee;

    #[test]
    fn bootstrap_initializes_store() {
        let committee = TestCommittee::new(1);
        let (root, bootstrap) = committee.bootstrap(8192 * 3 + 64);

        let store = initialize_light_client_store(root, &bootstrap, ForkName::Deneb).unwrap();

        assert_eq!(store.finalized_header, bootstrap.header.beacon);
        assert_eq!(store.optimistic_header, bootstrap.header.beacon);
        assert_eq!(store.finalized_period(), 3);
        assert!(!store.is_next_sync_committee_known());
        assert!(store.best_valid_update.is_none());
        assert_eq!(store.safety_threshold(), 0);
    }

    #[test]
    fn bootstrap_rejects_untrusted_root() {
        let committee = TestCommittee::new(1);
        let (_, bootstrap) = committee.bootstrap(64);

        let err = initialize_light_client_store(B256::repeat_byte(0xee), &bootstrap, ForkName::Deneb)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidHeaderHash(_, _)));
    }

    #[test]
    fn bootstrap_rejects_bad_committee_proof() {
        let committee = TestCommittee::new(1);
        let (root, mut bootstrap) = committee.bootstrap(64);
        bootstrap.current_sync_committee_branch[0] = B256::repeat_byte(0xff);

        let err = initialize_light_client_store(root, &bootstrap, ForkName::Deneb).unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidCurrentSyncCommitteeProof));
    }

    #[test]
    fn bootstrap_checks_branch_depth_per_fork() {
        let committee = TestCommittee::new(1);
        let (root, bootstrap) = committee.bootstrap(64);

        let err = initialize_light_client_store(root, &bootstrap, ForkName::Electra).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::InvalidBranchLength {
                gindex: 86,
                expected: 6,
                actual: 5
            }
        ));

        let err = initialize_light_client_store(root, &bootstrap, ForkName::Phase0).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::UnsupportedFork(Some(ForkName::Phase0))
        ));
    }

    #[test]
    fn safety_threshold_uses_larger_counter() {
        let store = LightClientStore {
            previous_max_active_participants: 301,
            current_max_active_participants: 120,
            ..Default::default()
        };
        assert_eq!(store.safety_threshold(), 150);
    }
}
