use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::catalog::name::CatalogName;
use crate::common::types::{IsolationLevel, TransactionId};
use crate::transaction::record::TransactionRecord;
use crate::transaction::state::TransactionState;

/// Point-in-time snapshot of a transaction, independent of the live record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub transaction_id: TransactionId,
    pub isolation_level: IsolationLevel,
    pub read_only: bool,
    pub auto_commit: bool,
    pub create_time: SystemTime,
    /// Zero unless the transaction is currently inactive
    pub idle_time: Duration,
    /// Bound catalogs in binding order
    pub catalog_names: Vec<CatalogName>,
    pub written_catalog: Option<CatalogName>,
    pub state: TransactionState,
}

impl TransactionInfo {
    /// Copy the record under its lock so the catalog list is never torn
    pub(crate) fn capture(record: &TransactionRecord) -> Self {
        let inner = record.inner();
        let state = record.state();
        let idle_time = match (state, inner.idle_since) {
            (TransactionState::Inactive, Some(since)) => since.elapsed(),
            _ => Duration::ZERO,
        };

        Self {
            transaction_id: record.id(),
            isolation_level: record.isolation_level(),
            read_only: record.is_read_only(),
            auto_commit: record.is_auto_commit(),
            create_time: record.created_at(),
            idle_time,
            catalog_names: inner.bindings.keys().cloned().collect(),
            written_catalog: inner.written_catalog.clone(),
            state,
        }
    }
}
