use alloy_primitives::B256;
use light_client::{
    config::Forks,
    consensus::{types::ForkName, utils::compute_fork_digest},
};

/// Fork digests of every scheduled fork of a network.
///
/// Digests prefix gossip topics and RPC response chunks, so they identify the fork a payload
/// was encoded for.
#[derive(Debug, Clone, Default)]
pub struct ForkDigests {
    digests: Vec<(ForkName, [u8; 4])>,
}

impl ForkDigests {
    pub fn new(forks: &Forks, genesis_validators_root: B256) -> Self {
        let digests = forks
            .scheduled()
            .into_iter()
            .map(|(name, fork)| {
                (
                    name,
                    compute_fork_digest(fork.fork_version.0, genesis_validators_root),
                )
            })
            .collect();
        Self { digests }
    }

    pub fn fork_name(&self, digest: [u8; 4]) -> Option<ForkName> {
        self.digests
            .iter()
            .find(|(_, known)| *known == digest)
            .map(|(name, _)| *name)
    }

    pub fn digest(&self, fork: ForkName) -> Option<[u8; 4]> {
        self.digests
            .iter()
            .find(|(name, _)| *name == fork)
            .map(|(_, digest)| *digest)
    }

    pub fn is_scheduled(&self, fork: ForkName) -> bool {
        self.digest(fork).is_some()
    }
}

#[cfg(test)]
mod tests {
    use light_client::config::networks;

    use super::*;

    #[test]
    fn mainnet_digests() {
        let mainnet = networks::mainnet();
        let digests = ForkDigests::new(&mainnet.forks, mainnet.chain.genesis_root);

        assert_eq!(digests.digest(ForkName::Deneb), Some([0x6a, 0x95, 0xa1, 0xa9]));
        assert_eq!(
            digests.fork_name([0xbb, 0xa4, 0xda, 0x96]),
            Some(ForkName::Capella)
        );
        assert_eq!(digests.fork_name([0; 4]), None);
        assert!(digests.is_scheduled(ForkName::Electra));
    }
}
