//! State transitions of the Altair light client sync protocol.
//!
//! https://github.com/ethereum/consensus-specs/blob/dev/specs/altair/light-client/sync-protocol.md

use alloy_primitives::B256;
use blst::min_pk::PublicKey;
use tracing::{debug, info};
use tree_hash::TreeHash;

use super::{
    constants::{DOMAIN_SYNC_COMMITTEE, MIN_SYNC_COMMITTEE_PARTICIPANTS, SYNC_COMMITTEE_SIZE, UPDATE_TIMEOUT},
    errors::ConsensusError,
    store::LightClientStore,
    types::GenericUpdate,
    utils::*,
};
use crate::config::Forks;

fn has_supermajority(participants: u64) -> bool {
    participants * 3 >= SYNC_COMMITTEE_SIZE * 2
}

pub fn validate_light_client_update(
    store: &LightClientStore,
    update: &GenericUpdate,
    current_slot: u64,
    genesis_root: B256,
    forks: &Forks,
) -> Result<(), ConsensusError> {
    let participants = get_bits(&update.sync_aggregate.sync_committee_bits);
    if participants < MIN_SYNC_COMMITTEE_PARTICIPANTS {
        return Err(ConsensusError::InsufficientParticipation);
    }

    let update_finalized_slot = update.finalized_slot();
    let valid_time = current_slot >= update.signature_slot
        && update.signature_slot > update.attested_header.slot
        && update.attested_header.slot >= update_finalized_slot;
    if !valid_time {
        return Err(ConsensusError::InvalidTimestamp);
    }

    let store_period = calc_sync_period(store.finalized_header.slot);
    let update_sig_period = calc_sync_period(update.signature_slot);
    let valid_period = if store.is_next_sync_committee_known() {
        update_sig_period == store_period || update_sig_period == store_period + 1
    } else {
        update_sig_period == store_period
    };
    if !valid_period {
        return Err(ConsensusError::InvalidPeriod);
    }

    let update_attested_period = calc_sync_period(update.attested_header.slot);
    let update_has_next_committee = !store.is_next_sync_committee_known()
        && update.is_sync_committee_update()
        && update_attested_period == store_period;
    if update.attested_header.slot <= store.finalized_header.slot && !update_has_next_committee {
        return Err(ConsensusError::NotRelevant);
    }

    let fork = forks.fork_at_slot(update.attested_header.slot);
    if !fork.supports_light_client() {
        return Err(ConsensusError::UnsupportedFork(Some(fork)));
    }

    if let (Some(finalized_header), Some(finality_branch)) =
        (&update.finalized_header, &update.finality_branch)
    {
        // the genesis block is finalized as the zero root
        let finalized_root = if finalized_header.slot == 0 {
            if *finalized_header != Default::default() {
                return Err(ConsensusError::InvalidFinalizedHeader);
            }
            B256::ZERO
        } else {
            finalized_header.tree_hash_root()
        };

        let is_valid = is_proof_valid(
            update.attested_header.state_root,
            finalized_root,
            finality_branch,
            fork.finalized_root_gindex(),
        )?;
        if !is_valid {
            return Err(ConsensusError::InvalidFinalityProof);
        }
    }

    if let (Some(next_sync_committee), Some(next_sync_committee_branch)) =
        (&update.next_sync_committee, &update.next_sync_committee_branch)
    {
        if update_attested_period == store_period {
            if let Some(known) = &store.next_sync_committee {
                if known != next_sync_committee {
                    return Err(ConsensusError::InconsistentNextSyncCommittee);
                }
            }
        }

        let is_valid = is_proof_valid(
            update.attested_header.state_root,
            next_sync_committee.tree_hash_root(),
            next_sync_committee_branch,
            fork.next_sync_committee_gindex(),
        )?;
        if !is_valid {
            return Err(ConsensusError::InvalidNextSyncCommitteeProof);
        }
    }

    let sync_committee = if update_sig_period == store_period {
        &store.current_sync_committee
    } else {
        store
            .next_sync_committee
            .as_ref()
            .ok_or(ConsensusError::InvalidPeriod)?
    };

    let pks = get_participating_keys(sync_committee, &update.sync_aggregate.sync_committee_bits)?;
    let pks: Vec<&PublicKey> = pks.iter().collect();

    let fork_version = forks.fork_version(update.signature_slot.max(1) - 1);
    let domain = compute_domain(DOMAIN_SYNC_COMMITTEE, fork_version.0, genesis_root);
    let signing_root = compute_signing_root(update.attested_header.tree_hash_root(), domain);

    if !is_aggregate_valid(
        &update.sync_aggregate.sync_committee_signature,
        signing_root.as_slice(),
        &pks,
    ) {
        return Err(ConsensusError::InvalidSignature);
    }

    Ok(())
}

/// Ranks two valid updates, returning true when `new` should replace `old` as
/// `best_valid_update`.
pub fn is_better_update(new: &GenericUpdate, old: &GenericUpdate) -> bool {
    let new_num_active_participants = get_bits(&new.sync_aggregate.sync_committee_bits);
    let old_num_active_participants = get_bits(&old.sync_aggregate.sync_committee_bits);
    let new_has_supermajority = has_supermajority(new_num_active_participants);
    let old_has_supermajority = has_supermajority(old_num_active_participants);
    if new_has_supermajority != old_has_supermajority {
        return new_has_supermajority;
    }
    if !new_has_supermajority && new_num_active_participants != old_num_active_participants {
        return new_num_active_participants > old_num_active_participants;
    }

    let has_relevant_sync_committee = |update: &GenericUpdate| {
        update.is_sync_committee_update()
            && calc_sync_period(update.attested_header.slot)
                == calc_sync_period(update.signature_slot)
    };
    let new_has_relevant_sync_committee = has_relevant_sync_committee(new);
    let old_has_relevant_sync_committee = has_relevant_sync_committee(old);
    if new_has_relevant_sync_committee != old_has_relevant_sync_committee {
        return new_has_relevant_sync_committee;
    }

    let new_has_finality = new.is_finality_update();
    let old_has_finality = old.is_finality_update();
    if new_has_finality != old_has_finality {
        return new_has_finality;
    }

    if new_has_finality {
        let has_sync_committee_finality = |update: &GenericUpdate| {
            calc_sync_period(update.finalized_slot())
                == calc_sync_period(update.attested_header.slot)
        };
        let new_has_sync_committee_finality = has_sync_committee_finality(new);
        let old_has_sync_committee_finality = has_sync_committee_finality(old);
        if new_has_sync_committee_finality != old_has_sync_committee_finality {
            return new_has_sync_committee_finality;
        }
    }

    if new_num_active_participants != old_num_active_participants {
        return new_num_active_participants > old_num_active_participants;
    }

    if new.attested_header.slot != old.attested_header.slot {
        return new.attested_header.slot < old.attested_header.slot;
    }
    new.signature_slot < old.signature_slot
}

pub fn apply_light_client_update(
    store: &mut LightClientStore,
    update: &GenericUpdate,
) -> Result<(), ConsensusError> {
    let finalized_header = update
        .finalized_header
        .as_ref()
        .ok_or(ConsensusError::InvalidFinalizedHeader)?;
    let store_period = calc_sync_period(store.finalized_header.slot);
    let update_finalized_period = calc_sync_period(finalized_header.slot);

    if !store.is_next_sync_committee_known() {
        if update_finalized_period != store_period {
            return Err(ConsensusError::InvalidPeriod);
        }
        store
            .next_sync_committee
            .clone_from(&update.next_sync_committee);
    } else if update_finalized_period == store_period + 1 {
        if let Some(next_sync_committee) = store.next_sync_committee.take() {
            store.current_sync_committee = next_sync_committee;
        }
        store
            .next_sync_committee
            .clone_from(&update.next_sync_committee);
        store.previous_max_active_participants = store.current_max_active_participants;
        store.current_max_active_participants = 0;
        info!(period = update_finalized_period, "sync committee updated");
    }

    if finalized_header.slot > store.finalized_header.slot {
        store.finalized_header = finalized_header.clone();
        if store.finalized_header.slot > store.optimistic_header.slot {
            store.optimistic_header = store.finalized_header.clone();
        }
    }

    Ok(())
}

pub fn process_light_client_update(
    store: &mut LightClientStore,
    update: &GenericUpdate,
    current_slot: u64,
    genesis_root: B256,
    forks: &Forks,
) -> Result<(), ConsensusError> {
    validate_light_client_update(store, update, current_slot, genesis_root, forks)?;

    let participants = get_bits(&update.sync_aggregate.sync_committee_bits);

    let replace_best = store
        .best_valid_update
        .as_ref()
        .map_or(true, |best| is_better_update(update, best));
    if replace_best {
        store.best_valid_update = Some(update.clone());
    }

    store.current_max_active_participants =
        u64::max(store.current_max_active_participants, participants);

    if participants > store.safety_threshold()
        && update.attested_header.slot > store.optimistic_header.slot
    {
        store.optimistic_header = update.attested_header.clone();
    }

    let update_has_finalized_next_sync_committee = !store.is_next_sync_committee_known()
        && update.is_sync_committee_update()
        && update.is_finality_update()
        && calc_sync_period(update.finalized_slot())
            == calc_sync_period(update.attested_header.slot);

    if !has_supermajority(participants) {
        debug!(
            participants,
            slot = update.attested_header.slot,
            "skipping update with low vote count"
        );
        return Ok(());
    }

    if update.finalized_slot() > store.finalized_header.slot
        || update_has_finalized_next_sync_committee
    {
        apply_light_client_update(store, update)?;
        store.best_valid_update = None;
    }

    Ok(())
}

/// Promotes `best_valid_update` once no finality has been seen for `UPDATE_TIMEOUT` slots.
///
/// Returns whether an update was applied.
pub fn process_light_client_store_force_update(
    store: &mut LightClientStore,
    current_slot: u64,
) -> Result<bool, ConsensusError> {
    if current_slot <= store.finalized_header.slot + UPDATE_TIMEOUT {
        return Ok(false);
    }
    let Some(mut best_valid_update) = store.best_valid_update.take() else {
        return Ok(false);
    };

    // the attested header stands in for the finalized one during long non-finality
    if best_valid_update.finalized_slot() <= store.finalized_header.slot {
        best_valid_update.finalized_header = Some(best_valid_update.attested_header.clone());
    }
    apply_light_client_update(store, &best_valid_update)?;
    Ok(true)
}
