use std::fmt;

use light_client::consensus::types::ForkName;
use strum::{EnumIter, IntoEnumIterator};

use super::methods::{MAX_ERROR_LEN, MAX_REQUEST_BLOB_SIDECARS, MAX_REQUEST_BLOCKS};
use crate::{fork_digest::ForkDigests, MAX_PAYLOAD_SIZE};

const ROOT_LEN: usize = 32;
const BLOB_IDENTIFIER_LEN: usize = 40;
const STATUS_LEN: usize = 84;
const U64_LEN: usize = 8;
const METADATA_V1_LEN: usize = 16;
const METADATA_V2_LEN: usize = 17;
// smallest SSZ encodings of the phase0 block and altair light client containers
const SIGNED_BEACON_BLOCK_MIN_LEN: usize = 404;
const BLOB_SIDECAR_LEN: usize = 131_928;
const LIGHT_CLIENT_BOOTSTRAP_MIN_LEN: usize = 24_896;
const LIGHT_CLIENT_UPDATE_MIN_LEN: usize = 25_368;
const LIGHT_CLIENT_FINALITY_UPDATE_MIN_LEN: usize = 584;
const LIGHT_CLIENT_OPTIMISTIC_UPDATE_MIN_LEN: usize = 280;

/// Request/response protocols of the consensus p2p interface, in the order they are tried when
/// guessing which protocol a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum SupportedProtocol {
    StatusV1,
    GoodbyeV1,
    BlocksByRangeV2,
    BlocksByRangeV1,
    BlocksByRootV2,
    BlocksByRootV1,
    PingV1,
    MetaDataV2,
    MetaDataV1,
    BlobsByRangeV1,
    BlobsByRootV1,
    LightClientBootstrapV1,
    LightClientUpdatesByRangeV1,
    LightClientFinalityUpdateV1,
    LightClientOptimisticUpdateV1,
}

/// Inclusive bounds on the SSZ length of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SszLimits {
    pub min: usize,
    pub max: usize,
    /// Variable length lists must be a whole number of items.
    pub item_len: usize,
}

impl SszLimits {
    const fn fixed(len: usize) -> Self {
        Self {
            min: len,
            max: len,
            item_len: 1,
        }
    }

    const fn list(item_len: usize, max_items: usize) -> Self {
        Self {
            min: 0,
            max: item_len * max_items,
            item_len,
        }
    }

    const fn at_least(min: usize) -> Self {
        Self {
            min,
            max: MAX_PAYLOAD_SIZE,
            item_len: 1,
        }
    }

    pub fn contains(&self, len: usize) -> bool {
        len >= self.min && len <= self.max && len % self.item_len == 0
    }
}

impl SupportedProtocol {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusV1 => "status",
            Self::GoodbyeV1 => "goodbye",
            Self::BlocksByRangeV1 | Self::BlocksByRangeV2 => "beacon_blocks_by_range",
            Self::BlocksByRootV1 | Self::BlocksByRootV2 => "beacon_blocks_by_root",
            Self::PingV1 => "ping",
            Self::MetaDataV1 | Self::MetaDataV2 => "metadata",
            Self::BlobsByRangeV1 => "blob_sidecars_by_range",
            Self::BlobsByRootV1 => "blob_sidecars_by_root",
            Self::LightClientBootstrapV1 => "light_client_bootstrap",
            Self::LightClientUpdatesByRangeV1 => "light_client_updates_by_range",
            Self::LightClientFinalityUpdateV1 => "light_client_finality_update",
            Self::LightClientOptimisticUpdateV1 => "light_client_optimistic_update",
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            Self::BlocksByRangeV2 | Self::BlocksByRootV2 | Self::MetaDataV2 => 2,
            _ => 1,
        }
    }

    pub fn protocol_id(&self) -> String {
        format!(
            "/eth2/beacon_chain/req/{}/{}/ssz_snappy",
            self.name(),
            self.version()
        )
    }

    /// Whether successful response chunks are prefixed by the fork digest of their payload.
    pub fn has_context_bytes(&self) -> bool {
        matches!(
            self,
            Self::BlocksByRangeV2
                | Self::BlocksByRootV2
                | Self::BlobsByRangeV1
                | Self::BlobsByRootV1
                | Self::LightClientBootstrapV1
                | Self::LightClientUpdatesByRangeV1
                | Self::LightClientFinalityUpdateV1
                | Self::LightClientOptimisticUpdateV1
        )
    }

    /// `None` for protocols whose requests carry no body.
    pub fn request_limits(&self) -> Option<SszLimits> {
        match self {
            Self::StatusV1 => Some(SszLimits::fixed(STATUS_LEN)),
            Self::GoodbyeV1 | Self::PingV1 => Some(SszLimits::fixed(U64_LEN)),
            // start_slot, count and the deprecated step
            Self::BlocksByRangeV1 | Self::BlocksByRangeV2 => Some(SszLimits::fixed(3 * U64_LEN)),
            Self::BlocksByRootV1 | Self::BlocksByRootV2 => {
                Some(SszLimits::list(ROOT_LEN, MAX_REQUEST_BLOCKS))
            }
            Self::BlobsByRangeV1 | Self::LightClientUpdatesByRangeV1 => {
                Some(SszLimits::fixed(2 * U64_LEN))
            }
            Self::BlobsByRootV1 => Some(SszLimits::list(
                BLOB_IDENTIFIER_LEN,
                MAX_REQUEST_BLOB_SIDECARS,
            )),
            Self::LightClientBootstrapV1 => Some(SszLimits::fixed(ROOT_LEN)),
            Self::MetaDataV1
            | Self::MetaDataV2
            | Self::LightClientFinalityUpdateV1
            | Self::LightClientOptimisticUpdateV1 => None,
        }
    }

    /// `None` for protocols that never respond.
    pub fn response_limits(&self) -> Option<SszLimits> {
        match self {
            Self::GoodbyeV1 => None,
            Self::StatusV1 => Some(SszLimits::fixed(STATUS_LEN)),
            Self::PingV1 => Some(SszLimits::fixed(U64_LEN)),
            Self::MetaDataV1 => Some(SszLimits::fixed(METADATA_V1_LEN)),
            Self::MetaDataV2 => Some(SszLimits::fixed(METADATA_V2_LEN)),
            Self::BlocksByRangeV1
            | Self::BlocksByRangeV2
            | Self::BlocksByRootV1
            | Self::BlocksByRootV2 => Some(SszLimits::at_least(SIGNED_BEACON_BLOCK_MIN_LEN)),
            Self::BlobsByRangeV1 | Self::BlobsByRootV1 => Some(SszLimits::fixed(BLOB_SIDECAR_LEN)),
            Self::LightClientBootstrapV1 => {
                Some(SszLimits::at_least(LIGHT_CLIENT_BOOTSTRAP_MIN_LEN))
            }
            Self::LightClientUpdatesByRangeV1 => {
                Some(SszLimits::at_least(LIGHT_CLIENT_UPDATE_MIN_LEN))
            }
            Self::LightClientFinalityUpdateV1 => {
                Some(SszLimits::at_least(LIGHT_CLIENT_FINALITY_UPDATE_MIN_LEN))
            }
            Self::LightClientOptimisticUpdateV1 => {
                Some(SszLimits::at_least(LIGHT_CLIENT_OPTIMISTIC_UPDATE_MIN_LEN))
            }
        }
    }

    pub fn error_limits() -> SszLimits {
        SszLimits::list(1, MAX_ERROR_LEN)
    }

    /// Protocols available on a network, given the forks it has scheduled.
    pub fn currently_supported(fork_digests: &ForkDigests) -> Vec<Self> {
        let deneb = fork_digests.is_scheduled(ForkName::Deneb);
        let altair = fork_digests.is_scheduled(ForkName::Altair);
        Self::iter()
            .filter(|protocol| match protocol {
                Self::BlobsByRangeV1 | Self::BlobsByRootV1 => deneb,
                Self::LightClientBootstrapV1
                | Self::LightClientUpdatesByRangeV1
                | Self::LightClientFinalityUpdateV1
                | Self::LightClientOptimisticUpdateV1 => altair,
                _ => true,
            })
            .collect()
    }
}

impl fmt::Display for SupportedProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.protocol_id())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use light_client::config::{networks, Fork, Forks};

    use super::*;

    #[test]
    fn protocol_ids() {
        assert_eq!(
            SupportedProtocol::BlocksByRangeV2.to_string(),
            "/eth2/beacon_chain/req/beacon_blocks_by_range/2/ssz_snappy"
        );
        assert_eq!(
            SupportedProtocol::LightClientUpdatesByRangeV1.protocol_id(),
            "/eth2/beacon_chain/req/light_client_updates_by_range/1/ssz_snappy"
        );
    }

    #[test]
    fn limits() {
        let roots = SupportedProtocol::BlocksByRootV2.request_limits().unwrap();
        assert!(roots.contains(64));
        assert!(!roots.contains(65));
        assert!(!roots.contains(32 * 1025));
        assert!(SupportedProtocol::MetaDataV2.request_limits().is_none());
        assert!(SupportedProtocol::GoodbyeV1.response_limits().is_none());
        assert!(SupportedProtocol::error_limits().contains(256));
        assert!(!SupportedProtocol::error_limits().contains(257));

        let blocks = SupportedProtocol::BlocksByRangeV2.response_limits().unwrap();
        assert!(!blocks.contains(8));
        assert!(blocks.contains(404));
    }

    #[test]
    fn pre_deneb_networks_have_no_blob_protocols() {
        let mainnet = networks::mainnet();
        let all = SupportedProtocol::currently_supported(&ForkDigests::new(
            &mainnet.forks,
            mainnet.chain.genesis_root,
        ));
        assert_eq!(all.len(), SupportedProtocol::iter().count());

        let phase0 = Forks {
            genesis: Fork {
                epoch: 0,
                fork_version: Default::default(),
            },
            ..Default::default()
        };
        let supported =
            SupportedProtocol::currently_supported(&ForkDigests::new(&phase0, B256::ZERO));
        assert!(!supported.contains(&SupportedProtocol::BlobsByRootV1));
        assert!(!supported.contains(&SupportedProtocol::LightClientBootstrapV1));
        assert!(supported.contains(&SupportedProtocol::StatusV1));
    }
}
