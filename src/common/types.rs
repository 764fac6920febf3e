use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a logical transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(u64);

/// Process-wide source of transaction ids. Ids are never reused, even across
/// manager instances.
static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

impl TransactionId {
    /// Allocate a fresh id, or `None` once the id space is exhausted
    pub fn allocate() -> Option<Self> {
        NEXT_TRANSACTION_ID
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(1))
            .ok()
            .map(TransactionId)
    }

    /// Raw numeric value of this id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction isolation levels, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// True if this level gives at least the guarantees of `required`
    pub fn meets_requirement_of(&self, required: IsolationLevel) -> bool {
        *self >= required
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::ReadUncommitted
    }
}
