pub mod beacon_api_rpc;
pub mod mock_rpc;

use alloy_primitives::B256;
use anyhow::Result;
use async_trait::async_trait;

use super::types::{
    ForkVersioned, LightClientBootstrap, LightClientFinalityUpdate, LightClientOptimisticUpdate,
    LightClientUpdate,
};

// implements https://github.com/ethereum/beacon-APIs/tree/master/apis/beacon/light_client
#[async_trait]
pub trait ConsensusRpc: Send + Sync + Clone {
    fn new(path: &str) -> Self;
    async fn get_bootstrap(&self, block_root: B256) -> Result<ForkVersioned<LightClientBootstrap>>;
    async fn get_updates(
        &self,
        period: u64,
        count: u64,
    ) -> Result<Vec<ForkVersioned<LightClientUpdate>>>;
    async fn get_finality_update(&self) -> Result<ForkVersioned<LightClientFinalityUpdate>>;
    async fn get_optimistic_update(&self) -> Result<ForkVersioned<LightClientOptimisticUpdate>>;
    async fn chain_id(&self) -> Result<u64>;
    fn name(&self) -> String;
}
