use std::{cmp, sync::Arc};

use alloy_primitives::B256;
use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use tree_hash::TreeHash;

use crate::{
    clock::SlotClock,
    config::Config,
    consensus::{
        constants::{MAX_REQUEST_LIGHT_CLIENT_UPDATES, SLOTS_PER_EPOCH, SYNC_COMMITTEE_SIZE},
        errors::ConsensusError,
        rpc::ConsensusRpc,
        store::{initialize_light_client_store, LightClientStore},
        sync_protocol::{process_light_client_store_force_update, process_light_client_update},
        types::{BeaconBlockHeader, ForkName, ForkVersioned, GenericUpdate},
        utils::{calc_sync_period, get_bits},
    },
    errors::NodeError,
    watch::LightClientWatchSenders,
};

/// Keeps a `LightClientStore` in sync with the chain by polling a consensus data provider.
pub struct LightClientSyncService<R: ConsensusRpc, C: SlotClock> {
    /// In memory storage for the light client state.
    store: Arc<RwLock<LightClientStore>>,
    /// Provider to fetch light client data from.
    rpc: R,
    slot_clock: C,
    config: Arc<Config>,
    senders: LightClientWatchSenders,
}

fn supported_fork(version: Option<ForkName>) -> Result<ForkName, ConsensusError> {
    match version {
        Some(fork) if fork.supports_light_client() => Ok(fork),
        _ => Err(ConsensusError::UnsupportedFork(version)),
    }
}

/// Fetches the bootstrap for `checkpoint` and initializes a store from it.
pub async fn bootstrap<R: ConsensusRpc, C: SlotClock>(
    rpc: &R,
    checkpoint: B256,
    config: &Config,
    slot_clock: &C,
) -> Result<LightClientStore> {
    let ForkVersioned { version, data } = rpc
        .get_bootstrap(checkpoint)
        .await
        .map_err(|err| anyhow!("could not fetch bootstrap: {err}"))?;
    let fork = supported_fork(version)?;

    let checkpoint_age = slot_clock.age_of(data.header.beacon.slot);
    if checkpoint_age.as_secs() >= config.max_checkpoint_age {
        if config.strict_checkpoint_age {
            return Err(ConsensusError::CheckpointTooOld.into());
        }
        warn!(
            age_secs = checkpoint_age.as_secs(),
            "checkpoint too old, consider using a more recent block"
        );
    }

    let store = initialize_light_client_store(checkpoint, &data, fork)?;
    info!(
        slot = store.finalized_header.slot,
        %checkpoint,
        %fork,
        "light client bootstrapped"
    );
    Ok(store)
}

impl<R: ConsensusRpc, C: SlotClock> LightClientSyncService<R, C> {
    pub fn new(
        store: Arc<RwLock<LightClientStore>>,
        rpc: R,
        slot_clock: C,
        config: Arc<Config>,
        senders: LightClientWatchSenders,
    ) -> Self {
        Self {
            store,
            rpc,
            slot_clock,
            config,
            senders,
        }
    }

    pub fn store(&self) -> Arc<RwLock<LightClientStore>> {
        self.store.clone()
    }

    /// Fails when the provider serves another network. Providers without `/eth/v1/config/spec` are
    /// accepted with a warning.
    pub async fn check_rpc(&self) -> Result<()> {
        match self.rpc.chain_id().await {
            Ok(chain_id) if chain_id != self.config.chain.chain_id => {
                Err(ConsensusError::IncorrectRpcNetwork.into())
            }
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(error = %err, rpc = %self.rpc.name(), "could not verify the network of the consensus rpc");
                Ok(())
            }
        }
    }

    pub async fn start(self) {
        info!(rpc = %self.rpc.name(), "starting light client sync service");
        loop {
            if let Err(err) = self.sync().await {
                error!(error = %err, "error occurred during sync");
            }

            if let Err(err) = self.update().await {
                error!(error = %err, "error occurred during update");
            }

            if let Err(err) = self.force_update() {
                error!(error = %err, "error occurred during force update");
            }

            let next_slot = self
                .slot_clock
                .duration_to_next_slot()
                .unwrap_or_else(|| self.slot_clock.slot_duration());
            sleep(next_slot).await;
        }
    }

    /// Catches the store up with the current sync committee period.
    pub async fn sync(&self) -> Result<()> {
        let current_period = calc_sync_period(self.current_slot()?);
        let (mut finalized_period, optimistic_period, is_next_sync_committee_known) = {
            let store = self.store.read();
            (
                store.finalized_period(),
                store.optimistic_period(),
                store.is_next_sync_committee_known(),
            )
        };

        if !is_next_sync_committee_known
            && (finalized_period == optimistic_period || finalized_period == current_period)
        {
            self.get_light_client_update(finalized_period, 1).await?;
        }

        while finalized_period + 1 < current_period {
            let start_period = finalized_period + 1;
            let count = cmp::min(MAX_REQUEST_LIGHT_CLIENT_UPDATES, current_period - start_period);
            self.get_light_client_update(start_period, count).await?;

            let new_finalized_period = self.store.read().finalized_period();
            if new_finalized_period == finalized_period {
                warn!(
                    start_period,
                    count, "light client updates did not advance the finalized period"
                );
                break;
            }
            finalized_period = new_finalized_period;
        }

        Ok(())
    }

    /// Processes the latest optimistic and finality updates.
    pub async fn update(&self) -> Result<()> {
        let (optimistic_update_res, finality_update_res) = tokio::join!(
            self.get_light_client_optimistic_update(),
            self.get_light_client_finality_update()
        );
        optimistic_update_res?;
        finality_update_res
    }

    pub fn force_update(&self) -> Result<bool> {
        let current_slot = self.current_slot()?;
        let mut store = self.store.write();
        let previous = (store.finalized_header.clone(), store.optimistic_header.clone());

        let applied = process_light_client_store_force_update(&mut store, current_slot)?;
        if applied {
            warn!(
                slot = store.finalized_header.slot,
                "no finality for a full sync committee period, forced update applied"
            );
            self.publish(&store, previous);
        }
        Ok(applied)
    }

    async fn get_light_client_update(&self, start_period: u64, count: u64) -> Result<()> {
        let light_client_updates = self.rpc.get_updates(start_period, count).await?;

        info!(
            start_period,
            count,
            received = light_client_updates.len(),
            "received light client updates"
        );

        for ForkVersioned { version, data } in light_client_updates {
            supported_fork(version)?;
            self.process_update(&GenericUpdate::from(&data))?;
        }

        Ok(())
    }

    async fn get_light_client_optimistic_update(&self) -> Result<()> {
        let ForkVersioned { version, data } = self.rpc.get_optimistic_update().await?;
        debug!(slot = data.signature_slot, "received light client optimistic update");

        supported_fork(version)?;
        self.process_update(&GenericUpdate::from(&data))
    }

    async fn get_light_client_finality_update(&self) -> Result<()> {
        let ForkVersioned { version, data } = self.rpc.get_finality_update().await?;
        debug!(slot = data.signature_slot, "received light client finality update");

        supported_fork(version)?;
        self.process_update(&GenericUpdate::from(&data))
    }

    fn process_update(&self, update: &GenericUpdate) -> Result<()> {
        let current_slot = self.current_slot()?;
        let mut store = self.store.write();
        let previous = (store.finalized_header.clone(), store.optimistic_header.clone());

        match process_light_client_update(
            &mut store,
            update,
            current_slot,
            self.config.chain.genesis_root,
            &self.config.forks,
        ) {
            Ok(()) => {}
            Err(ConsensusError::NotRelevant) => {
                debug!(
                    attested_slot = update.attested_header.slot,
                    "skipping update that is not newer than the store"
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        let participation =
            get_bits(&update.sync_aggregate.sync_committee_bits) as f32 / SYNC_COMMITTEE_SIZE as f32;
        if store.finalized_header != previous.0 {
            self.log_header("finalized slot", &store.finalized_header, participation);
        }
        if store.optimistic_header != previous.1 {
            self.log_header("updated head", &store.optimistic_header, participation);
        }
        self.publish(&store, previous);

        Ok(())
    }

    fn publish(
        &self,
        store: &LightClientStore,
        (finalized, optimistic): (BeaconBlockHeader, BeaconBlockHeader),
    ) {
        if store.finalized_header != finalized {
            self.senders
                .finalized_header
                .send_replace(Some(store.finalized_header.clone()));

            if store.finalized_header.slot % SLOTS_PER_EPOCH == 0 {
                let checkpoint = store.finalized_header.tree_hash_root();
                self.senders.checkpoint.send_replace(Some(checkpoint));
            }
        }
        if store.optimistic_header != optimistic {
            self.senders
                .optimistic_header
                .send_replace(Some(store.optimistic_header.clone()));
        }
    }

    fn log_header(&self, label: &str, header: &BeaconBlockHeader, participation: f32) {
        let participation = participation * 100f32;
        let decimals = if participation == 100.0 { 1 } else { 2 };
        let age = chrono::Duration::from_std(self.slot_clock.age_of(header.slot))
            .unwrap_or_else(|_| chrono::Duration::zero());

        info!(
            "{label:<26} slot={}  confidence={:.decimals$}%  age={:02}:{:02}:{:02}:{:02}",
            header.slot,
            participation,
            age.num_days(),
            age.num_hours() % 24,
            age.num_minutes() % 60,
            age.num_seconds() % 60,
        );
    }

    fn current_slot(&self) -> Result<u64, NodeError> {
        self.slot_clock.now().ok_or(NodeError::UnableToReadSlot)
    }
}
