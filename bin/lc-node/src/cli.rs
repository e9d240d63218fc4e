use std::{env, ffi::OsString, path::PathBuf, str::FromStr};

use alloy_primitives::B256;
use anyhow::Result;
use clap::{
    error::{Error, ErrorKind},
    Parser,
};
use lc_utils::dir::setup_data_dir;
use light_client::config::{CliConfig, Config, Network, NetworkSpec};

pub const APP_NAME: &str = "light-client";
const CONFIG_FILE_NAME: &str = "light-client.toml";

#[derive(Parser, Debug, PartialEq, Clone)]
#[command(name = APP_NAME, about = "Follow the beacon chain with the altair light client sync protocol")]
pub struct LightClientCli {
    #[arg(
        long,
        default_value = "mainnet",
        value_parser = network_parser,
        help = "Network to follow: mainnet, sepolia or custom"
    )]
    pub network: Network,

    #[arg(long, help = "Beacon API endpoint serving light client data")]
    pub consensus_rpc: Option<String>,

    #[arg(
        long,
        value_parser = check_block_root,
        help = "Hex encoded block root from a trusted checkpoint"
    )]
    pub checkpoint: Option<B256>,

    #[arg(long, help = "Directory for the saved checkpoint and the config file")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, help = "Use a fresh temporary data directory")]
    pub ephemeral: bool,

    #[arg(
        long,
        help = "TOML config file, defaults to light-client.toml in the data directory"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        long,
        requires = "genesis_validators_root",
        help = "Consensus config.yaml of a custom network"
    )]
    pub chain_config: Option<PathBuf>,

    #[arg(
        long,
        requires = "chain_config",
        value_parser = check_block_root,
        help = "Genesis validators root of a custom network"
    )]
    pub genesis_validators_root: Option<B256>,

    #[arg(
        long,
        help = "Refuse to start from a checkpoint older than the max checkpoint age"
    )]
    pub strict_checkpoint_age: bool,
}

impl LightClientCli {
    pub fn from_cli() -> Self {
        Self::new_from(env::args_os()).unwrap_or_else(|e| e.exit())
    }

    pub fn new_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Self::try_parse_from(args)?;

        match (cli.network, &cli.chain_config) {
            (Network::Custom, None) => Err(Error::raw(
                ErrorKind::MissingRequiredArgument,
                "A custom network needs --chain-config and --genesis-validators-root",
            )),
            (Network::Mainnet | Network::Sepolia, Some(_)) => Err(Error::raw(
                ErrorKind::ArgumentConflict,
                "--chain-config can only be used with --network custom",
            )),
            _ => Ok(cli),
        }
    }

    /// Resolves the data directory and layers every configuration source.
    pub fn to_config(&self) -> Result<Config> {
        let data_dir = setup_data_dir(APP_NAME, self.data_dir.clone(), self.ephemeral)?;
        let config_file = self
            .config_file
            .clone()
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));

        let mut base_config = self.network.to_base_config();
        if let (Some(chain_config), Some(genesis_root)) =
            (&self.chain_config, self.genesis_validators_root)
        {
            let NetworkSpec { chain, forks } =
                NetworkSpec::from_yaml_file(chain_config, genesis_root)?;
            base_config.chain = chain;
            base_config.forks = forks;
        }

        let cli_config = CliConfig {
            consensus_rpc: self.consensus_rpc.clone(),
            checkpoint: self.checkpoint,
            data_dir: Some(data_dir),
            strict_checkpoint_age: self.strict_checkpoint_age,
        };
        Config::from_base(base_config, &config_file, self.network, &cli_config)
    }
}

fn network_parser(network: &str) -> Result<Network, String> {
    Network::from_str(&network.to_lowercase())
        .map_err(|_| format!("Not a supported network: {network}"))
}

fn check_block_root(root: &str) -> Result<B256, String> {
    if !root.starts_with("0x") {
        return Err("Block root must be prefixed with 0x".to_owned());
    }

    if root.len() == 66 {
        return B256::from_str(root).map_err(|err| format!("HexError: {err}"));
    }
    Err(format!(
        "Invalid block root length: {}, expected 66 (0x-prefixed 32 byte hexstring)",
        root.len()
    ))
}
