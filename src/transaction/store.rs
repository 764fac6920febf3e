use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::TransactionId;
use crate::transaction::record::TransactionRecord;

/// Transaction store - the single source of truth for live transactions
#[derive(Default)]
pub struct TransactionStore {
    /// Live transactions map (id -> record)
    transactions: RwLock<HashMap<TransactionId, Arc<TransactionRecord>>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, record: Arc<TransactionRecord>) {
        self.transactions.write().insert(record.id(), record);
    }

    pub fn get(&self, id: TransactionId) -> Option<Arc<TransactionRecord>> {
        self.transactions.read().get(&id).cloned()
    }

    pub(crate) fn remove(&self, id: TransactionId) -> Option<Arc<TransactionRecord>> {
        self.transactions.write().remove(&id)
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.transactions.read().contains_key(&id)
    }

    /// All live records, ordered by id
    pub fn records(&self) -> Vec<Arc<TransactionRecord>> {
        let mut records: Vec<_> = self.transactions.read().values().cloned().collect();
        records.sort_by_key(|record| record.id());
        records
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }
}
