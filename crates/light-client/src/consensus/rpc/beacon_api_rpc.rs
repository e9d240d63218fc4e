use std::{cmp, time::Duration};

use alloy_primitives::B256;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_this_or_that::as_u64;
use tracing::{debug, warn};

use super::ConsensusRpc;
use crate::{
    consensus::{
        constants::MAX_REQUEST_LIGHT_CLIENT_UPDATES,
        types::{
            ForkVersioned, LightClientBootstrap, LightClientFinalityUpdate,
            LightClientOptimisticUpdate, LightClientUpdate,
        },
    },
    errors::RpcError,
};

pub const DEFAULT_BEACON_API_TIMEOUT: Duration = Duration::from_secs(2);

/// Light client data served by a beacon node's REST API.
#[derive(Clone, Debug)]
pub struct BeaconApiRpc {
    rpc: String,
    client: reqwest::Client,
}

impl BeaconApiRpc {
    pub fn with_timeout(rpc: &str, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "failed to build http client, requests will not time out");
                reqwest::Client::default()
            }
        };
        BeaconApiRpc {
            rpc: rpc.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, path: &str) -> Result<T> {
        let req = format!("{}{}", self.rpc, path);
        debug!(method, url = %req, "beacon api request");

        let res = self
            .client
            .get(req)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| RpcError::new(method, err))?
            .json::<T>()
            .await
            .map_err(|err| RpcError::new(method, err))?;

        Ok(res)
    }
}

#[async_trait]
impl ConsensusRpc for BeaconApiRpc {
    fn new(rpc: &str) -> Self {
        Self::with_timeout(rpc, DEFAULT_BEACON_API_TIMEOUT)
    }

    async fn get_bootstrap(&self, block_root: B256) -> Result<ForkVersioned<LightClientBootstrap>> {
        self.get(
            "bootstrap",
            &format!("/eth/v1/beacon/light_client/bootstrap/{block_root}"),
        )
        .await
    }

    async fn get_updates(
        &self,
        period: u64,
        count: u64,
    ) -> Result<Vec<ForkVersioned<LightClientUpdate>>> {
        let count = cmp::min(count, MAX_REQUEST_LIGHT_CLIENT_UPDATES);
        self.get(
            "updates",
            &format!("/eth/v1/beacon/light_client/updates?start_period={period}&count={count}"),
        )
        .await
    }

    async fn get_finality_update(&self) -> Result<ForkVersioned<LightClientFinalityUpdate>> {
        self.get(
            "finality_update",
            "/eth/v1/beacon/light_client/finality_update",
        )
        .await
    }

    async fn get_optimistic_update(&self) -> Result<ForkVersioned<LightClientOptimisticUpdate>> {
        self.get(
            "optimistic_update",
            "/eth/v1/beacon/light_client/optimistic_update",
        )
        .await
    }

    async fn chain_id(&self) -> Result<u64> {
        let res: SpecResponse = self.get("spec", "/eth/v1/config/spec").await?;
        Ok(res.data.chain_id)
    }

    fn name(&self) -> String {
        "beacon-api".to_string()
    }
}

#[derive(serde::Deserialize, Debug)]
struct SpecResponse {
    data: Spec,
}

#[derive(serde::Deserialize, Debug)]
struct Spec {
    #[serde(rename = "DEPOSIT_NETWORK_ID", deserialize_with = "as_u64")]
    chain_id: u64,
}
