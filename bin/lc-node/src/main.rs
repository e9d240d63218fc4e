#![warn(clippy::unwrap_used)]

mod cli;

use lc_utils::{log::init_tracing_logger, version::versioned_name};
use light_client::{
    consensus::rpc::beacon_api_rpc::BeaconApiRpc, database::FileDB, ClientBuilder,
};
use tracing::info;

use crate::cli::{LightClientCli, APP_NAME};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing_logger("info");
    let cli = LightClientCli::from_cli();
    let config = cli.to_config()?;
    info!(
        version = %versioned_name(APP_NAME),
        network = %cli.network,
        consensus_rpc = %config.consensus_rpc,
        "starting light client"
    );

    let mut client = ClientBuilder::new()
        .config(config)
        .build::<FileDB, BeaconApiRpc>()?;
    client.start().await?;

    tokio::signal::ctrl_c().await?;
    client.shutdown().await;

    Ok(())
}
