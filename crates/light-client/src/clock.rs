use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::RwLock;

use crate::consensus::types::Slot;

/// Maps wall-clock time onto beacon chain slots.
pub trait SlotClock: Send + Sync + Clone + 'static {
    /// Time since the unix epoch, as seen by this clock.
    fn now_duration(&self) -> Option<Duration>;

    fn genesis_duration(&self) -> Duration;

    fn slot_duration(&self) -> Duration;

    /// The current slot, or `None` before genesis.
    fn now(&self) -> Option<Slot> {
        let since_genesis = self.now_duration()?.checked_sub(self.genesis_duration())?;
        Some(since_genesis.as_secs() / self.slot_duration().as_secs().max(1))
    }

    fn start_of(&self, slot: Slot) -> Duration {
        self.genesis_duration()
            + Duration::from_secs(self.slot_duration().as_secs().saturating_mul(slot))
    }

    fn duration_to_next_slot(&self) -> Option<Duration> {
        let now = self.now_duration()?;
        let next_slot = match self.now() {
            Some(slot) => slot + 1,
            None => 0,
        };
        self.start_of(next_slot).checked_sub(now)
    }

    /// How long ago `slot` started. Zero for future slots.
    fn age_of(&self, slot: Slot) -> Duration {
        self.now_duration()
            .and_then(|now| now.checked_sub(self.start_of(slot)))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct SystemTimeSlotClock {
    genesis_duration: Duration,
    slot_duration: Duration,
}

impl SystemTimeSlotClock {
    pub fn new(genesis_time: u64, seconds_per_slot: u64) -> Self {
        Self {
            genesis_duration: Duration::from_secs(genesis_time),
            slot_duration: Duration::from_secs(seconds_per_slot),
        }
    }
}

impl SlotClock for SystemTimeSlotClock {
    fn now_duration(&self) -> Option<Duration> {
        SystemTime::now().duration_since(UNIX_EPOCH).ok()
    }

    fn genesis_duration(&self) -> Duration {
        self.genesis_duration
    }

    fn slot_duration(&self) -> Duration {
        self.slot_duration
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualSlotClock {
    genesis_duration: Duration,
    slot_duration: Duration,
    current_time: Arc<RwLock<Duration>>,
}

impl ManualSlotClock {
    pub fn new(genesis_time: u64, seconds_per_slot: u64) -> Self {
        Self {
            genesis_duration: Duration::from_secs(genesis_time),
            slot_duration: Duration::from_secs(seconds_per_slot),
            current_time: Arc::new(RwLock::new(Duration::from_secs(genesis_time))),
        }
    }

    pub fn set_slot(&self, slot: Slot) {
        *self.current_time.write() = self.start_of(slot);
    }

    pub fn set_current_time(&self, duration: Duration) {
        *self.current_time.write() = duration;
    }

    pub fn advance_slot(&self) {
        *self.current_time.write() += self.slot_duration;
    }
}

impl SlotClock for ManualSlotClock {
    fn now_duration(&self) -> Option<Duration> {
        Some(*self.current_time.read())
    }

    fn genesis_duration(&self) -> Duration {
        self.genesis_duration
    }

    fn slot_duration(&self) -> Duration {
        self.slot_duration
    }
}
