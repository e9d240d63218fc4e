use std::{collections::BTreeMap, fs, path::Path};

use alloy_primitives::{FixedBytes, B256};
use anyhow::{anyhow, bail, Context, Result};
use serde_yaml::Value;

use crate::{
    config::{ChainConfig, Fork, Forks},
    consensus::types::ForkName,
};

/// Chain parameters and fork schedule of a network, as published in its consensus `config.yaml`.
///
/// The genesis validators root is not part of `config.yaml` and is supplied separately.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSpec {
    pub chain: ChainConfig,
    pub forks: Forks,
}

impl NetworkSpec {
    pub fn from_yaml_file(path: &Path, genesis_root: B256) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read chain config {}", path.display()))?;
        Self::from_yaml_str(&content, genesis_root)
            .with_context(|| format!("invalid chain config {}", path.display()))
    }

    pub fn from_yaml_str(content: &str, genesis_root: B256) -> Result<Self> {
        let values: BTreeMap<String, Value> = serde_yaml::from_str(content)?;
        let config = YamlConfig { values };

        let min_genesis_time = config.u64("MIN_GENESIS_TIME")?;
        let genesis_delay = config.u64_or("GENESIS_DELAY", 0)?;
        let chain = ChainConfig {
            chain_id: config.u64_or("DEPOSIT_NETWORK_ID", 0)?,
            genesis_time: min_genesis_time + genesis_delay,
            genesis_root,
            seconds_per_slot: config.u64_or("SECONDS_PER_SLOT", 12)?,
        };

        let genesis = Fork {
            epoch: 0,
            fork_version: config.version("GENESIS_FORK_VERSION")?,
        };
        let fork = |name: ForkName| -> Result<Fork> {
            let prefix = name.to_string().to_uppercase();
            let epoch_key = format!("{prefix}_FORK_EPOCH");
            if !config.values.contains_key(&epoch_key) {
                return Ok(Fork::default());
            }
            Ok(Fork {
                epoch: config.u64(&epoch_key)?,
                fork_version: config.version(&format!("{prefix}_FORK_VERSION"))?,
            })
        };

        let forks = Forks {
            genesis,
            altair: fork(ForkName::Altair)?,
            bellatrix: fork(ForkName::Bellatrix)?,
            capella: fork(ForkName::Capella)?,
            deneb: fork(ForkName::Deneb)?,
            electra: fork(ForkName::Electra)?,
        };

        Ok(Self { chain, forks })
    }
}

struct YamlConfig {
    values: BTreeMap<String, Value>,
}

impl YamlConfig {
    fn get(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| anyhow!("missing field {key}"))
    }

    fn u64(&self, key: &str) -> Result<u64> {
        match self.get(key)? {
            Value::Number(number) => number
                .as_u64()
                .ok_or_else(|| anyhow!("{key} is not an unsigned integer")),
            Value::String(value) if value.starts_with("0x") => {
                u64::from_str_radix(&value[2..], 16).with_context(|| format!("invalid {key}"))
            }
            Value::String(value) => value.parse().with_context(|| format!("invalid {key}")),
            other => bail!("unexpected value for {key}: {other:?}"),
        }
    }

    fn u64_or(&self, key: &str, default: u64) -> Result<u64> {
        if self.values.contains_key(key) {
            self.u64(key)
        } else {
            Ok(default)
        }
    }

    /// Fork versions are 4-byte hex strings; unquoted `0x..` scalars may already have been
    /// read as integers.
    fn version(&self, key: &str) -> Result<FixedBytes<4>> {
        match self.get(key)? {
            Value::String(value) => {
                let bytes = lc_utils::bytes::hex_decode_lenient(value)
                    .with_context(|| format!("invalid {key}"))?;
                let bytes: [u8; 4] = bytes
                    .try_into()
                    .map_err(|_| anyhow!("{key} must be 4 bytes"))?;
                Ok(FixedBytes::from(bytes))
            }
            Value::Number(number) => {
                let version = number
                    .as_u64()
                    .and_then(|value| u32::try_from(value).ok())
                    .ok_or_else(|| anyhow!("{key} must be 4 bytes"))?;
                Ok(FixedBytes::from(version.to_be_bytes()))
            }
            other => bail!("unexpected value for {key}: {other:?}"),
        }
    }
}
