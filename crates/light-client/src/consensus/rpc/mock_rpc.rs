use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_primitives::B256;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use super::ConsensusRpc;
use crate::consensus::{
    constants::MAX_REQUEST_LIGHT_CLIENT_UPDATES,
    types::{
        ForkVersioned, LightClientBootstrap, LightClientFinalityUpdate,
        LightClientOptimisticUpdate, LightClientUpdate,
    },
    utils::calc_sync_period,
};

#[derive(Debug, Default)]
struct MockData {
    bootstrap: Option<ForkVersioned<LightClientBootstrap>>,
    updates: Vec<ForkVersioned<LightClientUpdate>>,
    finality_update: Option<ForkVersioned<LightClientFinalityUpdate>>,
    optimistic_update: Option<ForkVersioned<LightClientOptimisticUpdate>>,
    chain_id: Option<u64>,
    update_requests: Vec<(u64, u64)>,
}

/// Serves light client data from memory, falling back to JSON files in a test data directory
/// (`bootstrap.json`, `updates.json`, `finality.json`, `optimistic.json`).
#[derive(Clone, Debug, Default)]
pub struct MockRpc {
    testdata: Option<PathBuf>,
    data: Arc<RwLock<MockData>>,
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let content = read_to_string(dir.join(file))?;
    Ok(serde_json::from_str(&content)?)
}

impl MockRpc {
    pub fn set_bootstrap(&self, bootstrap: ForkVersioned<LightClientBootstrap>) {
        self.data.write().bootstrap = Some(bootstrap);
    }

    pub fn push_update(&self, update: ForkVersioned<LightClientUpdate>) {
        self.data.write().updates.push(update);
    }

    pub fn set_finality_update(&self, update: ForkVersioned<LightClientFinalityUpdate>) {
        self.data.write().finality_update = Some(update);
    }

    pub fn set_optimistic_update(&self, update: ForkVersioned<LightClientOptimisticUpdate>) {
        self.data.write().optimistic_update = Some(update);
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.data.write().chain_id = Some(chain_id);
    }

    /// `(start_period, count)` of every `get_updates` call so far.
    pub fn update_requests(&self) -> Vec<(u64, u64)> {
        self.data.read().update_requests.clone()
    }

    fn testdata(&self) -> Result<&Path> {
        self.testdata
            .as_deref()
            .ok_or_else(|| anyhow!("no mock data configured"))
    }
}

#[async_trait]
impl ConsensusRpc for MockRpc {
    fn new(path: &str) -> Self {
        MockRpc {
            testdata: (!path.is_empty()).then(|| PathBuf::from(path)),
            data: Default::default(),
        }
    }

    async fn get_bootstrap(&self, _block_root: B256) -> Result<ForkVersioned<LightClientBootstrap>> {
        if let Some(bootstrap) = &self.data.read().bootstrap {
            return Ok(bootstrap.clone());
        }
        read_json(self.testdata()?, "bootstrap.json")
    }

    async fn get_updates(
        &self,
        period: u64,
        count: u64,
    ) -> Result<Vec<ForkVersioned<LightClientUpdate>>> {
        let count = count.min(MAX_REQUEST_LIGHT_CLIENT_UPDATES);
        let mut data = self.data.write();
        data.update_requests.push((period, count));

        let updates = if data.updates.is_empty() && self.testdata.is_some() {
            read_json(self.testdata()?, "updates.json")?
        } else {
            data.updates.clone()
        };

        Ok(updates
            .into_iter()
            .filter(|update| {
                let update_period = calc_sync_period(update.data.attested_header.beacon.slot);
                update_period >= period && update_period < period + count
            })
            .take(count as usize)
            .collect())
    }

    async fn get_finality_update(&self) -> Result<ForkVersioned<LightClientFinalityUpdate>> {
        if let Some(update) = &self.data.read().finality_update {
            return Ok(update.clone());
        }
        read_json(self.testdata()?, "finality.json")
    }

    async fn get_optimistic_update(&self) -> Result<ForkVersioned<LightClientOptimisticUpdate>> {
        if let Some(update) = &self.data.read().optimistic_update {
            return Ok(update.clone());
        }
        read_json(self.testdata()?, "optimistic.json")
    }

    async fn chain_id(&self) -> Result<u64> {
        self.data
            .read()
            .chain_id
            .ok_or_else(|| anyhow!("chain id not configured"))
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}
