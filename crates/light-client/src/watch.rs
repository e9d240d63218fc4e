use alloy_primitives::B256;
use tokio::sync::watch;

use crate::consensus::types::BeaconBlockHeader;

/// The [tokio::sync::watch::channel] Receivers for light client store changes.
///
/// Value will be `None` until first update.
#[derive(Clone)]
pub struct LightClientWatchReceivers {
    pub finalized_header: watch::Receiver<Option<BeaconBlockHeader>>,
    pub optimistic_header: watch::Receiver<Option<BeaconBlockHeader>>,
    /// Root of the latest finalized header at an epoch boundary.
    pub checkpoint: watch::Receiver<Option<B256>>,
}

/// The [tokio::sync::watch::channel] Senders for light client store changes.
#[derive(Debug, Clone)]
pub struct LightClientWatchSenders {
    pub finalized_header: watch::Sender<Option<BeaconBlockHeader>>,
    pub optimistic_header: watch::Sender<Option<BeaconBlockHeader>>,
    pub checkpoint: watch::Sender<Option<B256>>,
}

impl LightClientWatchSenders {
    pub fn subscribe(&self) -> LightClientWatchReceivers {
        LightClientWatchReceivers {
            finalized_header: self.finalized_header.subscribe(),
            optimistic_header: self.optimistic_header.subscribe(),
            checkpoint: self.checkpoint.subscribe(),
        }
    }
}

pub fn light_client_watch_channels() -> (LightClientWatchSenders, LightClientWatchReceivers) {
    let (finalized_header_sender, finalized_header_receiver) = watch::channel(None);
    let (optimistic_header_sender, optimistic_header_receiver) = watch::channel(None);
    let (checkpoint_sender, checkpoint_receiver) = watch::channel(None);
    let senders = LightClientWatchSenders {
        finalized_header: finalized_header_sender,
        optimistic_header: optimistic_header_sender,
        checkpoint: checkpoint_sender,
    };
    let receivers = LightClientWatchReceivers {
        finalized_header: finalized_header_receiver,
        optimistic_header: optimistic_header_receiver,
        checkpoint: checkpoint_receiver,
    };
    (senders, receivers)
}
