mod base;
pub mod chain_config;
pub mod client_config;
pub mod networks;
mod types;

use std::{collections::HashMap, path::PathBuf};

use alloy_primitives::B256;
pub use base::*;
pub use chain_config::NetworkSpec;
pub use client_config::Config;
use figment::{providers::Serialized, value::Value};
pub use networks::Network;
pub use types::*;

/// Values given on the command line. They take precedence over every other source.
#[derive(Debug, Default, Clone)]
pub struct CliConfig {
    pub consensus_rpc: Option<String>,
    pub checkpoint: Option<B256>,
    pub data_dir: Option<PathBuf>,
    pub strict_checkpoint_age: bool,
}

impl CliConfig {
    pub fn as_provider(&self, network: &str) -> Serialized<HashMap<&str, Value>> {
        let mut user_dict = HashMap::new();

        if let Some(rpc) = &self.consensus_rpc {
            user_dict.insert("consensus_rpc", Value::from(rpc.clone()));
        }

        if let Some(checkpoint) = &self.checkpoint {
            user_dict.insert("checkpoint", Value::from(checkpoint.to_string()));
        }

        if let Some(data_dir) = &self.data_dir {
            user_dict.insert(
                "data_dir",
                Value::from(data_dir.to_string_lossy().to_string()),
            );
        }

        if self.strict_checkpoint_age {
            user_dict.insert("strict_checkpoint_age", Value::from(true));
        }

        Serialized::from(user_dict, network)
    }
}
