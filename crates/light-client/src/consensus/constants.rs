// Mainnet preset values from
// https://github.com/ethereum/consensus-specs/blob/dev/presets/mainnet/altair.yaml
pub const SLOTS_PER_EPOCH: u64 = 32;
pub const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: u64 = 256;
pub const SYNC_COMMITTEE_SIZE: u64 = 512;
pub const MIN_SYNC_COMMITTEE_PARTICIPANTS: u64 = 1;
/// Slots without finality after which `best_valid_update` is force-applied.
pub const UPDATE_TIMEOUT: u64 = SLOTS_PER_EPOCH * EPOCHS_PER_SYNC_COMMITTEE_PERIOD;

// Beacon API limit for `/eth/v1/beacon/light_client/updates`.
pub const MAX_REQUEST_LIGHT_CLIENT_UPDATES: u64 = 128;

pub const DOMAIN_SYNC_COMMITTEE: [u8; 4] = [0x07, 0x00, 0x00, 0x00];
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;

// Generalized indices into the `BeaconState` tree.
pub const FINALIZED_ROOT_GINDEX: u64 = 105;
pub const CURRENT_SYNC_COMMITTEE_GINDEX: u64 = 54;
pub const NEXT_SYNC_COMMITTEE_GINDEX: u64 = 55;
pub const FINALIZED_ROOT_GINDEX_ELECTRA: u64 = 169;
pub const CURRENT_SYNC_COMMITTEE_GINDEX_ELECTRA: u64 = 86;
pub const NEXT_SYNC_COMMITTEE_GINDEX_ELECTRA: u64 = 87;
