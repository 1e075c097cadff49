//! Epoch tagging for session resources.
//!
//! Each `connect()` or `destroy()` advances the clock. Anything spawned on behalf
//! of an earlier epoch (transport callbacks, the ICE pump, the playback monitor,
//! an in-flight connect) holds an `EpochGuard` and stops acting once it is stale.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct EpochClock {
    current: Arc<AtomicU64>,
}

impl EpochClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch; every guard issued before this call becomes stale.
    pub fn advance(&self) -> EpochGuard {
        let epoch = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        EpochGuard {
            epoch,
            clock: self.clone(),
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Guard for the epoch that is live right now.
    pub fn guard(&self) -> EpochGuard {
        EpochGuard {
            epoch: self.current(),
            clock: self.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EpochGuard {
    epoch: u64,
    clock: EpochClock,
}

impl EpochGuard {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_live(&self) -> bool {
        self.clock.current() == self.epoch
    }
}
