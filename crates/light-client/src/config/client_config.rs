use std::path::{Path, PathBuf};

use alloy_primitives::{FixedBytes, B256};
use anyhow::{anyhow, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::config::{BaseConfig, ChainConfig, CliConfig, Forks, Network};

/// Environment variables with this prefix override values from the config file.
pub const ENV_PREFIX: &str = "LIGHT_CLIENT_";

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Config {
    pub consensus_rpc: String,
    pub default_checkpoint: B256,
    #[serde(default)]
    pub checkpoint: Option<B256>,
    pub data_dir: Option<PathBuf>,
    pub chain: ChainConfig,
    pub forks: Forks,
    pub max_checkpoint_age: u64,
    #[serde(default)]
    pub strict_checkpoint_age: bool,
}

impl Config {
    /// Layers the network preset, the `[<network>]` table of the TOML file at `config_path`,
    /// `LIGHT_CLIENT_*` environment variables and finally the command line.
    pub fn from_file(config_path: &Path, network: Network, cli_config: &CliConfig) -> Result<Self> {
        Self::from_base(network.to_base_config(), config_path, network, cli_config)
    }

    pub fn from_base(
        base_config: BaseConfig,
        config_path: &Path,
        network: Network,
        cli_config: &CliConfig,
    ) -> Result<Self> {
        let profile = network.to_string();

        let base_provider = Serialized::from(base_config, profile.as_str());
        let toml_provider = Toml::file(config_path).nested();
        let env_provider = Env::prefixed(ENV_PREFIX).global();
        let cli_provider = cli_config.as_provider(&profile);

        Figment::new()
            .merge(base_provider)
            .merge(toml_provider)
            .merge(env_provider)
            .merge(cli_provider)
            .select(profile.as_str())
            .extract()
            .map_err(|err| match err.kind {
                figment::error::Kind::MissingField(field) => {
                    let field = field.replace('_', "-");
                    anyhow!(
                        "missing configuration field: {field}, try supplying the proper command line argument: --{field}"
                    )
                }
                _ => anyhow!("cannot parse configuration: {err}"),
            })
    }

    pub fn fork_version(&self, slot: u64) -> FixedBytes<4> {
        self.forks.fork_version(slot)
    }

    pub fn to_base_config(&self) -> BaseConfig {
        BaseConfig {
            consensus_rpc: Some(self.consensus_rpc.clone()),
            default_checkpoint: self.default_checkpoint,
            chain: self.chain.clone(),
            forks: self.forks.clone(),
            max_checkpoint_age: self.max_checkpoint_age,
        }
    }
}
