use std::{fmt, ops::Deref};

use alloy_primitives::B256;
use lc_utils::bytes::{hex_decode, hex_encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_this_or_that::as_u64;
use ssz_types::{
    typenum::{U48, U512, U96},
    BitVector, FixedVector,
};
use strum::{Display, EnumIter, EnumString};
use tree_hash_derive::TreeHash;

use super::constants::{
    CURRENT_SYNC_COMMITTEE_GINDEX, CURRENT_SYNC_COMMITTEE_GINDEX_ELECTRA, FINALIZED_ROOT_GINDEX,
    FINALIZED_ROOT_GINDEX_ELECTRA, NEXT_SYNC_COMMITTEE_GINDEX, NEXT_SYNC_COMMITTEE_GINDEX_ELECTRA,
};

pub type Slot = u64;
pub type Epoch = u64;
pub type SyncCommitteeSize = U512;

/// Types based off specs @
/// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#beaconblockheader
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize, TreeHash)]
pub struct BeaconBlockHeader {
    #[serde(deserialize_with = "as_u64")]
    pub slot: u64,
    #[serde(deserialize_with = "as_u64")]
    pub proposer_index: u64,
    pub parent_root: B256,
    pub state_root: B256,
    pub body_root: B256,
}

/// A compressed BLS12-381 public key.
#[derive(Debug, PartialEq, Clone, TreeHash)]
pub struct PubKey {
    pub inner: FixedVector<u8, U48>,
}

impl Default for PubKey {
    fn default() -> Self {
        Self {
            inner: FixedVector::from_elem(0),
        }
    }
}

impl Deref for PubKey {
    type Target = FixedVector<u8, U48>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl TryFrom<&[u8]> for PubKey {
    type Error = String;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        FixedVector::new(bytes.to_vec())
            .map(|inner| Self { inner })
            .map_err(|err| format!("invalid pubkey length {}: {err:?}", bytes.len()))
    }
}

impl<'de> Deserialize<'de> for PubKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let result: String = Deserialize::deserialize(deserializer)?;
        let result = hex_decode(&result).map_err(serde::de::Error::custom)?;
        PubKey::try_from(result.as_slice()).map_err(serde::de::Error::custom)
    }
}

impl Serialize for PubKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex_encode(&self.inner[..]))
    }
}

/// A compressed BLS12-381 signature.
#[derive(Debug, PartialEq, Clone)]
pub struct BlsSignature {
    pub signature: FixedVector<u8, U96>,
}

impl Default for BlsSignature {
    fn default() -> Self {
        Self {
            signature: FixedVector::from_elem(0),
        }
    }
}

impl TryFrom<&[u8]> for BlsSignature {
    type Error = String;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        FixedVector::new(bytes.to_vec())
            .map(|signature| Self { signature })
            .map_err(|err| format!("invalid signature length {}: {err:?}", bytes.len()))
    }
}

impl<'de> Deserialize<'de> for BlsSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let result: String = Deserialize::deserialize(deserializer)?;
        let result = hex_decode(&result).map_err(serde::de::Error::custom)?;
        BlsSignature::try_from(result.as_slice()).map_err(serde::de::Error::custom)
    }
}

impl Serialize for BlsSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex_encode(&self.signature[..]))
    }
}

/// https://github.com/ethereum/consensus-specs/blob/dev/specs/altair/beacon-chain.md#synccommittee
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, TreeHash)]
pub struct SyncCommittee {
    pub pubkeys: FixedVector<PubKey, SyncCommitteeSize>,
    pub aggregate_pubkey: PubKey,
}

impl Default for SyncCommittee {
    fn default() -> Self {
        Self {
            pubkeys: FixedVector::from_elem(PubKey::default()),
            aggregate_pubkey: PubKey::default(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SyncAggregate {
    pub sync_committee_bits: BitVector<SyncCommitteeSize>,
    pub sync_committee_signature: BlsSignature,
}

impl Default for SyncAggregate {
    fn default() -> Self {
        Self {
            sync_committee_bits: BitVector::new(),
            sync_committee_signature: BlsSignature::default(),
        }
    }
}

/// Header wrapper served by the light client endpoints. Execution payload fields added in
/// Capella are not needed for consensus verification and are skipped when deserializing.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct LightClientHeader {
    pub beacon: BeaconBlockHeader,
}

impl From<BeaconBlockHeader> for LightClientHeader {
    fn from(beacon: BeaconBlockHeader) -> Self {
        LightClientHeader { beacon }
    }
}

/// `LightClientBootstrap` object for the configured trusted block root.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LightClientBootstrap {
    pub header: LightClientHeader,
    pub current_sync_committee: SyncCommittee,
    pub current_sync_committee_branch: Vec<B256>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LightClientUpdate {
    pub attested_header: LightClientHeader,
    pub next_sync_committee: SyncCommittee,
    pub next_sync_committee_branch: Vec<B256>,
    pub finalized_header: LightClientHeader,
    pub finality_branch: Vec<B256>,
    pub sync_aggregate: SyncAggregate,
    #[serde(deserialize_with = "as_u64")]
    pub signature_slot: u64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LightClientFinalityUpdate {
    pub attested_header: LightClientHeader,
    pub finalized_header: LightClientHeader,
    pub finality_branch: Vec<B256>,
    pub sync_aggregate: SyncAggregate,
    #[serde(deserialize_with = "as_u64")]
    pub signature_slot: u64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LightClientOptimisticUpdate {
    pub attested_header: LightClientHeader,
    pub sync_aggregate: SyncAggregate,
    #[serde(deserialize_with = "as_u64")]
    pub signature_slot: u64,
}

/// The common shape of full, finality and optimistic updates.
///
/// Parts that an update does not carry are `None`. Full updates served by the beacon API encode
/// "absent" as an all-zero branch, which is mapped to `None` as well.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericUpdate {
    pub attested_header: BeaconBlockHeader,
    pub sync_aggregate: SyncAggregate,
    pub signature_slot: u64,
    pub next_sync_committee: Option<SyncCommittee>,
    pub next_sync_committee_branch: Option<Vec<B256>>,
    pub finalized_header: Option<BeaconBlockHeader>,
    pub finality_branch: Option<Vec<B256>>,
}

impl GenericUpdate {
    pub fn is_sync_committee_update(&self) -> bool {
        self.next_sync_committee.is_some() && self.next_sync_committee_branch.is_some()
    }

    pub fn is_finality_update(&self) -> bool {
        self.finalized_header.is_some() && self.finality_branch.is_some()
    }

    pub fn finalized_slot(&self) -> Slot {
        self.finalized_header
            .as_ref()
            .map(|header| header.slot)
            .unwrap_or_default()
    }
}

fn is_empty_branch(branch: &[B256]) -> bool {
    branch.iter().all(|node| node.is_zero())
}

impl From<&LightClientUpdate> for GenericUpdate {
    fn from(update: &LightClientUpdate) -> Self {
        let (next_sync_committee, next_sync_committee_branch) =
            if is_empty_branch(&update.next_sync_committee_branch) {
                (None, None)
            } else {
                (
                    Some(update.next_sync_committee.clone()),
                    Some(update.next_sync_committee_branch.clone()),
                )
            };
        let (finalized_header, finality_branch) = if is_empty_branch(&update.finality_branch) {
            (None, None)
        } else {
            (
                Some(update.finalized_header.beacon.clone()),
                Some(update.finality_branch.clone()),
            )
        };

        Self {
            attested_header: update.attested_header.beacon.clone(),
            sync_aggregate: update.sync_aggregate.clone(),
            signature_slot: update.signature_slot,
            next_sync_committee,
            next_sync_committee_branch,
            finalized_header,
            finality_branch,
        }
    }
}

impl From<&LightClientFinalityUpdate> for GenericUpdate {
    fn from(update: &LightClientFinalityUpdate) -> Self {
        Self {
            attested_header: update.attested_header.beacon.clone(),
            sync_aggregate: update.sync_aggregate.clone(),
            signature_slot: update.signature_slot,
            next_sync_committee: None,
            next_sync_committee_branch: None,
            finalized_header: Some(update.finalized_header.beacon.clone()),
            finality_branch: Some(update.finality_branch.clone()),
        }
    }
}

impl From<&LightClientOptimisticUpdate> for GenericUpdate {
    fn from(update: &LightClientOptimisticUpdate) -> Self {
        Self {
            attested_header: update.attested_header.beacon.clone(),
            sync_aggregate: update.sync_aggregate.clone(),
            signature_slot: update.signature_slot,
            next_sync_committee: None,
            next_sync_committee_branch: None,
            finalized_header: None,
            finality_branch: None,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ForkName {
    Phase0,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
    Electra,
}

impl ForkName {
    /// Light client data only exists from Altair onwards.
    pub fn supports_light_client(&self) -> bool {
        *self >= ForkName::Altair
    }

    pub fn finalized_root_gindex(&self) -> u64 {
        match self {
            ForkName::Electra => FINALIZED_ROOT_GINDEX_ELECTRA,
            _ => FINALIZED_ROOT_GINDEX,
        }
    }

    pub fn current_sync_committee_gindex(&self) -> u64 {
        match self {
            ForkName::Electra => CURRENT_SYNC_COMMITTEE_GINDEX_ELECTRA,
            _ => CURRENT_SYNC_COMMITTEE_GINDEX,
        }
    }

    pub fn next_sync_committee_gindex(&self) -> u64 {
        match self {
            ForkName::Electra => NEXT_SYNC_COMMITTEE_GINDEX_ELECTRA,
            _ => NEXT_SYNC_COMMITTEE_GINDEX,
        }
    }
}

/// The `{ "version": ..., "data": ... }` envelope used by the beacon API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkVersioned<T> {
    pub version: Option<ForkName>,
    pub data: T,
}

impl<T> ForkVersioned<T> {
    pub fn new(version: ForkName, data: T) -> Self {
        Self {
            version: Some(version),
            data,
        }
    }
}

impl fmt::Display for BeaconBlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slot={} proposer={} state_root={}",
            self.slot, self.proposer_index, self.state_root
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn header_accepts_quoted_numbers() {
        let value = json!({
            "slot": "8192",
            "proposer_index": 7,
            "parent_root": B256::repeat_byte(1),
            "state_root": B256::repeat_byte(2),
            "body_root": B256::repeat_byte(3),
        });
        let header: BeaconBlockHeader = serde_json::from_value(value).unwrap();
        assert_eq!(header.slot, 8192);
        assert_eq!(header.proposer_index, 7);
        assert_eq!(header.state_root, B256::repeat_byte(2));
    }

    #[test]
    fn light_client_header_ignores_execution_fields() {
        let value = json!({
            "beacon": {
                "slot": "1",
                "proposer_index": "2",
                "parent_root": B256::ZERO,
                "state_root": B256::ZERO,
                "body_root": B256::ZERO,
            },
            "execution": { "block_number": "12" },
            "execution_branch": [B256::ZERO],
        });
        let header: LightClientHeader = serde_json::from_value(value).unwrap();
        assert_eq!(header.beacon.slot, 1);
    }

    #[test]
    fn pubkey_rejects_wrong_length() {
        let short = serde_json::from_value::<PubKey>(json!("0x0102"));
        assert!(short.is_err());

        let key = PubKey::try_from([7u8; 48].as_slice()).unwrap();
        let encoded = serde_json::to_value(&key).unwrap();
        assert_eq!(serde_json::from_value::<PubKey>(encoded).unwrap(), key);
    }

    #[test]
    fn zero_branches_become_absent_parts() {
        let update = LightClientUpdate {
            attested_header: LightClientHeader::default(),
            next_sync_committee: SyncCommittee::default(),
            next_sync_committee_branch: vec![B256::ZERO; 5],
            finalized_header: LightClientHeader::default(),
            finality_branch: vec![B256::repeat_byte(9); 6],
            sync_aggregate: SyncAggregate::default(),
            signature_slot: 3,
        };
        let generic = GenericUpdate::from(&update);
        assert!(!generic.is_sync_committee_update());
        assert!(generic.is_finality_update());
    }

    #[test]
    fn fork_names_parse_lowercase() {
        assert_eq!(ForkName::from_str("deneb").unwrap(), ForkName::Deneb);
        assert_eq!(ForkName::Phase0.to_string(), "phase0");
        let versioned: ForkVersioned<u64> =
            serde_json::from_value(json!({ "version": "electra", "data": 5 })).unwrap();
        assert_eq!(versioned.version, Some(ForkName::Electra));
        assert!(!ForkName::Phase0.supports_light_client());
        assert_eq!(ForkName::Electra.finalized_root_gindex(), 169);
        assert_eq!(ForkName::Capella.next_sync_committee_gindex(), 55);
    }
}
