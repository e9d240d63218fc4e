use alloy_primitives::{FixedBytes, B256};
use serde::{Deserialize, Serialize};

use crate::consensus::{
    constants::{FAR_FUTURE_EPOCH, SLOTS_PER_EPOCH},
    types::ForkName,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub genesis_time: u64,
    pub genesis_root: B256,
    #[serde(default = "default_seconds_per_slot")]
    pub seconds_per_slot: u64,
}

fn default_seconds_per_slot() -> u64 {
    12
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 0,
            genesis_time: 0,
            genesis_root: B256::ZERO,
            seconds_per_slot: default_seconds_per_slot(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Forks {
    pub genesis: Fork,
    pub altair: Fork,
    pub bellatrix: Fork,
    pub capella: Fork,
    pub deneb: Fork,
    pub electra: Fork,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Fork {
    pub epoch: u64,
    pub fork_version: FixedBytes<4>,
}

impl Default for Fork {
    fn default() -> Self {
        Self {
            epoch: FAR_FUTURE_EPOCH,
            fork_version: FixedBytes::ZERO,
        }
    }
}

impl Fork {
    pub fn is_scheduled(&self) -> bool {
        self.epoch != FAR_FUTURE_EPOCH
    }
}

impl Forks {
    pub fn get(&self, fork: ForkName) -> &Fork {
        match fork {
            ForkName::Phase0 => &self.genesis,
            ForkName::Altair => &self.altair,
            ForkName::Bellatrix => &self.bellatrix,
            ForkName::Capella => &self.capella,
            ForkName::Deneb => &self.deneb,
            ForkName::Electra => &self.electra,
        }
    }

    /// Forks with an activation epoch, oldest first.
    pub fn scheduled(&self) -> Vec<(ForkName, &Fork)> {
        [
            ForkName::Phase0,
            ForkName::Altair,
            ForkName::Bellatrix,
            ForkName::Capella,
            ForkName::Deneb,
            ForkName::Electra,
        ]
        .into_iter()
        .map(|name| (name, self.get(name)))
        .filter(|(name, fork)| *name == ForkName::Phase0 || fork.is_scheduled())
        .collect()
    }

    pub fn fork_at_epoch(&self, epoch: u64) -> ForkName {
        self.scheduled()
            .into_iter()
            .rev()
            .find(|(_, fork)| epoch >= fork.epoch)
            .map(|(name, _)| name)
            .unwrap_or(ForkName::Phase0)
    }

    pub fn fork_at_slot(&self, slot: u64) -> ForkName {
        self.fork_at_epoch(slot / SLOTS_PER_EPOCH)
    }

    pub fn fork_version(&self, slot: u64) -> FixedBytes<4> {
        self.get(self.fork_at_slot(slot)).fork_version
    }
}
