//! Shared slot clock

use crate::types::Slot;
use parking_lot::RwLock;
use std::sync::Arc;

/// Discrete clock shared between the driver, the network and every validator.
/// Clones observe the same counter.
#[derive(Debug, Clone, Default)]
pub struct Ticker {
    slot: Arc<RwLock<Slot>>,
}

impl Ticker {
    /// Start at slot 0
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Slot {
        *self.slot.read()
    }

    /// Advance by one slot
    pub fn tick(&self) {
        *self.slot.write() += 1;
    }
}
