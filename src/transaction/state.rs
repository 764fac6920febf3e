use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Transaction lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionState {
    Active = 0,
    Inactive = 1,
    Committing = 2,
    Aborting = 3,
    Failed = 4,
}

impl TransactionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TransactionState::Active,
            1 => TransactionState::Inactive,
            2 => TransactionState::Committing,
            3 => TransactionState::Aborting,
            _ => TransactionState::Failed,
        }
    }

    /// Catalog access is allowed in these states
    pub fn is_open(&self) -> bool {
        matches!(self, TransactionState::Active | TransactionState::Inactive)
    }

    /// Claimed by a commit or abort
    pub fn is_finishing(&self) -> bool {
        matches!(self, TransactionState::Committing | TransactionState::Aborting)
    }
}

/// Lock-free holder of a `TransactionState`
#[derive(Debug)]
pub(crate) struct AtomicTransactionState(AtomicU8);

impl AtomicTransactionState {
    pub(crate) fn new(state: TransactionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> TransactionState {
        TransactionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move to `to` if the current state is one of `from`.
    /// Returns the previous state on success and the observed state otherwise.
    pub(crate) fn transition(
        &self,
        from: &[TransactionState],
        to: TransactionState,
    ) -> Result<TransactionState, TransactionState> {
        let mut current = self.load();
        loop {
            if !from.contains(&current) {
                return Err(current);
            }
            match self.0.compare_exchange(current as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return Ok(current),
                Err(actual) => current = TransactionState::from_u8(actual),
            }
        }
    }
}
