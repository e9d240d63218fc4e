use std::{path::PathBuf, sync::Arc};

use alloy_primitives::B256;
use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    clock::{SlotClock, SystemTimeSlotClock},
    config::{Config, Network, NetworkSpec},
    consensus::{rpc::ConsensusRpc, store::LightClientStore, types::BeaconBlockHeader},
    database::Database,
    errors::NodeError,
    sync_service::{bootstrap, LightClientSyncService},
    watch::{light_client_watch_channels, LightClientWatchReceivers, LightClientWatchSenders},
};

#[derive(Default)]
pub struct ClientBuilder {
    network: Option<Network>,
    consensus_rpc: Option<String>,
    checkpoint: Option<B256>,
    data_dir: Option<PathBuf>,
    config: Option<Config>,
    network_spec: Option<NetworkSpec>,
    strict_checkpoint_age: bool,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    pub fn consensus_rpc(mut self, consensus_rpc: &str) -> Self {
        self.consensus_rpc = Some(consensus_rpc.to_string());
        self
    }

    pub fn checkpoint(mut self, checkpoint: B256) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = Some(data_dir);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Chain parameters and forks of a custom network, usually read from its `config.yaml`.
    pub fn network_spec(mut self, network_spec: NetworkSpec) -> Self {
        self.network_spec = Some(network_spec);
        self
    }

    pub fn strict_checkpoint_age(mut self) -> Self {
        self.strict_checkpoint_age = true;
        self
    }

    pub fn build_config(self) -> Result<Config> {
        let mut base_config = match (self.network, &self.config) {
            (Some(network), _) => network.to_base_config(),
            (None, Some(config)) => config.to_base_config(),
            (None, None) if self.network_spec.is_some() => Network::Custom.to_base_config(),
            (None, None) => return Err(anyhow!("missing network config")),
        };
        if let Some(NetworkSpec { chain, forks }) = self.network_spec {
            base_config.chain = chain;
            base_config.forks = forks;
        }

        let consensus_rpc = self
            .consensus_rpc
            .or_else(|| self.config.as_ref().map(|config| config.consensus_rpc.clone()))
            .or(base_config.consensus_rpc)
            .ok_or_else(|| anyhow!("missing consensus rpc"))?;

        let checkpoint = self
            .checkpoint
            .or_else(|| self.config.as_ref().and_then(|config| config.checkpoint));

        let default_checkpoint = self
            .config
            .as_ref()
            .map(|config| config.default_checkpoint)
            .unwrap_or(base_config.default_checkpoint);

        let data_dir = self
            .data_dir
            .or_else(|| self.config.as_ref().and_then(|config| config.data_dir.clone()));

        let strict_checkpoint_age = self.strict_checkpoint_age
            || self
                .config
                .as_ref()
                .is_some_and(|config| config.strict_checkpoint_age);

        Ok(Config {
            consensus_rpc,
            default_checkpoint,
            checkpoint,
            data_dir,
            chain: base_config.chain,
            forks: base_config.forks,
            max_checkpoint_age: base_config.max_checkpoint_age,
            strict_checkpoint_age,
        })
    }

    pub fn build<DB: Database, R: ConsensusRpc + 'static>(
        self,
    ) -> Result<Client<DB, R, SystemTimeSlotClock>> {
        let config = self.build_config()?;
        let slot_clock =
            SystemTimeSlotClock::new(config.chain.genesis_time, config.chain.seconds_per_slot);
        Client::new(config, slot_clock)
    }
}

pub struct Client<DB: Database, R: ConsensusRpc, C: SlotClock = SystemTimeSlotClock> {
    config: Arc<Config>,
    db: Arc<DB>,
    rpc: R,
    slot_clock: C,
    store: Option<Arc<RwLock<LightClientStore>>>,
    senders: LightClientWatchSenders,
    receivers: LightClientWatchReceivers,
    handles: Vec<JoinHandle<()>>,
}

impl<DB: Database, R: ConsensusRpc + 'static, C: SlotClock> Client<DB, R, C> {
    pub fn new(mut config: Config, slot_clock: C) -> Result<Self> {
        let db = DB::new(&config)?;
        if config.checkpoint.is_none() {
            let checkpoint = db.load_checkpoint()?;
            config.checkpoint = Some(checkpoint);
        }

        let rpc = R::new(&config.consensus_rpc);
        let (senders, receivers) = light_client_watch_channels();

        Ok(Client {
            config: Arc::new(config),
            db: Arc::new(db),
            rpc,
            slot_clock,
            store: None,
            senders,
            receivers,
            handles: vec![],
        })
    }

    /// Bootstraps from the configured checkpoint, catches up and keeps syncing in the background.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        let checkpoint = self
            .config
            .checkpoint
            .unwrap_or(self.config.default_checkpoint);

        let store = bootstrap(&self.rpc, checkpoint, &self.config, &self.slot_clock)
            .await
            .map_err(NodeError::ConsensusClientCreationError)?;
        let store = Arc::new(RwLock::new(store));

        let service = LightClientSyncService::new(
            store.clone(),
            self.rpc.clone(),
            self.slot_clock.clone(),
            self.config.clone(),
            self.senders.clone(),
        );
        service
            .check_rpc()
            .await
            .map_err(NodeError::ConsensusClientCreationError)?;
        service.sync().await.map_err(NodeError::ConsensusSyncError)?;

        self.store = Some(store);
        self.handles.push(tokio::spawn(service.start()));
        self.start_checkpoint_saver();

        Ok(())
    }

    fn start_checkpoint_saver(&mut self) {
        let db = self.db.clone();
        let mut checkpoint_receiver = self.senders.checkpoint.subscribe();

        self.handles.push(tokio::spawn(async move {
            while checkpoint_receiver.changed().await.is_ok() {
                let checkpoint = *checkpoint_receiver.borrow_and_update();
                let Some(checkpoint) = checkpoint else {
                    continue;
                };
                if let Err(err) = db.save_checkpoint(checkpoint) {
                    error!(error = %err, %checkpoint, "failed to save checkpoint");
                }
            }
        }));
    }

    /// Stops the background tasks and persists the latest epoch-boundary checkpoint.
    pub async fn shutdown(&mut self) {
        info!("shutting down light client");
        for handle in self.handles.drain(..) {
            handle.abort();
        }

        let checkpoint = *self.receivers.checkpoint.borrow();
        match checkpoint {
            Some(checkpoint) => {
                if let Err(err) = self.db.save_checkpoint(checkpoint) {
                    warn!(error = %err, "failed to save checkpoint");
                } else {
                    info!(%checkpoint, "saved checkpoint");
                }
            }
            None => info!("no new checkpoint to save"),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn finalized_header(&self) -> Option<BeaconBlockHeader> {
        self.store
            .as_ref()
            .map(|store| store.read().finalized_header.clone())
    }

    pub fn optimistic_header(&self) -> Option<BeaconBlockHeader> {
        self.store
            .as_ref()
            .map(|store| store.read().optimistic_header.clone())
    }

    pub fn subscribe(&self) -> LightClientWatchReceivers {
        self.senders.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;
    use tree_hash::TreeHash;

    use super::*;
    use crate::{
        clock::ManualSlotClock,
        consensus::{
            rpc::mock_rpc::MockRpc,
            test_utils::{header, test_chain, test_forks, to_light_client_update, TestCommittee},
            types::{ForkName, ForkVersioned},
        },
        database::{ConfigDB, FileDB},
    };

    const PERIOD: u64 = 8192;

    #[test]
    fn builder_uses_network_preset() {
        let config = ClientBuilder::new()
            .network(Network::Mainnet)
            .checkpoint(B256::repeat_byte(7))
            .strict_checkpoint_age()
            .build_config()
            .unwrap();

        assert_eq!(config.consensus_rpc, "https://www.lightclientdata.org");
        assert_eq!(config.checkpoint, Some(B256::repeat_byte(7)));
        assert_eq!(config.chain.chain_id, 1);
        assert!(config.strict_checkpoint_age);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn builder_requires_rpc_and_network() {
        assert!(ClientBuilder::new().build_config().is_err());
        assert!(ClientBuilder::new()
            .network(Network::Sepolia)
            .build_config()
            .is_err());
    }

    #[test]
    fn builder_applies_network_spec() {
        let spec = NetworkSpec {
            chain: test_chain(),
            forks: test_forks(),
        };
        let config = ClientBuilder::new()
            .network_spec(spec)
            .consensus_rpc("http://localhost:4000")
            .build_config()
            .unwrap();

        assert_eq!(config.chain, test_chain());
        assert_eq!(config.forks, test_forks());
        assert_eq!(config.default_checkpoint, B256::ZERO);
    }

    #[test]
    fn explicit_checkpoint_is_kept() {
        let config = ClientBuilder::new()
            .network(Network::Mainnet)
            .checkpoint(B256::repeat_byte(3))
            .build_config()
            .unwrap();
        let client: Client<ConfigDB, MockRpc, ManualSlotClock> =
            Client::new(config, ManualSlotClock::new(0, 12)).unwrap();
        assert_eq!(client.config().checkpoint, Some(B256::repeat_byte(3)));
        assert!(client.finalized_header().is_none());
    }

    #[test(tokio::test)]
    async fn start_syncs_and_saves_checkpoint() {
        let committees: Vec<TestCommittee> = (0..4).map(TestCommittee::new).collect();
        let (root, bootstrap_data) = committees[1].bootstrap(PERIOD + 32);

        let data_dir = tempfile::tempdir().unwrap();
        let config = Config {
            consensus_rpc: String::new(),
            checkpoint: Some(root),
            data_dir: Some(data_dir.path().to_path_buf()),
            chain: test_chain(),
            forks: test_forks(),
            max_checkpoint_age: u64::MAX,
            ..Default::default()
        };
        let clock = ManualSlotClock::new(test_chain().genesis_time, 12);
        clock.set_slot(3 * PERIOD + 5);

        let mut client: Client<FileDB, MockRpc, ManualSlotClock> =
            Client::new(config, clock).unwrap();
        client
            .rpc
            .set_bootstrap(ForkVersioned::new(ForkName::Deneb, bootstrap_data));
        for period in 1..3u64 {
            let finalized = header(period * PERIOD + 64);
            let update = committees[period as usize].update(
                period * PERIOD + 100,
                period * PERIOD + 101,
                Some(&finalized),
                Some(&committees[period as usize + 1].committee),
                512,
            );
            client.rpc.push_update(ForkVersioned::new(
                ForkName::Deneb,
                to_light_client_update(&update),
            ));
        }

        client.start().await.unwrap();
        assert_eq!(
            client.finalized_header(),
            Some(header(2 * PERIOD + 64))
        );

        client.shutdown().await;
        let db = FileDB::new(client.config()).unwrap();
        assert_eq!(
            db.load_checkpoint().unwrap(),
            header(2 * PERIOD + 64).tree_hash_root()
        );
    }

    #[test(tokio::test)]
    async fn start_fails_on_bad_checkpoint() {
        let committee = TestCommittee::new(1);
        let (_, bootstrap_data) = committee.bootstrap(PERIOD + 32);
        let config = Config {
            checkpoint: Some(B256::repeat_byte(1)),
            chain: test_chain(),
            forks: test_forks(),
            max_checkpoint_age: u64::MAX,
            ..Default::default()
        };
        let clock = ManualSlotClock::new(test_chain().genesis_time, 12);
        clock.set_slot(PERIOD + 40);

        let mut client: Client<ConfigDB, MockRpc, ManualSlotClock> =
            Client::new(config, clock).unwrap();
        client
            .rpc
            .set_bootstrap(ForkVersioned::new(ForkName::Deneb, bootstrap_data));

        let err = client.start().await.unwrap_err();
        assert!(matches!(err, NodeError::ConsensusClientCreationError(_)));
        assert!(client.finalized_header().is_none());
    }
}
