// In-memory connector
// Keeps a fixed set of schemas and tracks every transaction it hands out, so
// callers can observe exactly how often commit and rollback were invoked.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::common::types::IsolationLevel;
use crate::connector::{
    Connector, ConnectorError, ConnectorMetadata, ConnectorTransactionHandle, Result,
};

/// Operation counters of a `MemoryConnector`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryConnectorStats {
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
    pub failed: usize,
}

/// Connector backed by an in-memory schema map
pub struct MemoryConnector {
    /// Schema name -> table names
    schemas: BTreeMap<String, Vec<String>>,

    /// Highest isolation level this connector can honour
    max_isolation_level: IsolationLevel,

    next_handle: AtomicU64,
    open_transactions: Mutex<HashSet<ConnectorTransactionHandle>>,

    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    operation_delay: Mutex<Duration>,

    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
    failed: AtomicUsize,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    /// Create a connector with a single empty `default` schema
    pub fn new() -> Self {
        let mut schemas = BTreeMap::new();
        schemas.insert("default".to_string(), Vec::new());
        Self {
            schemas,
            max_isolation_level: IsolationLevel::Serializable,
            next_handle: AtomicU64::new(1),
            open_transactions: Mutex::new(HashSet::new()),
            fail_commit: AtomicBool::new(false),
            fail_rollback: AtomicBool::new(false),
            operation_delay: Mutex::new(Duration::ZERO),
            begun: AtomicUsize::new(0),
            committed: AtomicUsize::new(0),
            rolled_back: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Add (or replace) a schema with the given tables
    pub fn with_schema(mut self, schema: &str, tables: &[&str]) -> Self {
        self.schemas.insert(
            schema.to_string(),
            tables.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// Limit the isolation levels this connector accepts
    pub fn with_max_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.max_isolation_level = level;
        self
    }

    /// Make every following commit fail
    pub fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Make every following rollback fail
    pub fn set_fail_rollback(&self, fail: bool) {
        self.fail_rollback.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside every commit and rollback
    pub fn set_operation_delay(&self, delay: Duration) {
        *self.operation_delay.lock() = delay;
    }

    pub fn stats(&self) -> MemoryConnectorStats {
        MemoryConnectorStats {
            begun: self.begun.load(Ordering::SeqCst),
            committed: self.committed.load(Ordering::SeqCst),
            rolled_back: self.rolled_back.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Number of transactions begun but not yet committed or rolled back
    pub fn open_transaction_count(&self) -> usize {
        self.open_transactions.lock().len()
    }

    fn finish(&self, handle: &ConnectorTransactionHandle, fail: &AtomicBool, done: &AtomicUsize, op: &str) -> Result<()> {
        let delay = *self.operation_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if !self.open_transactions.lock().remove(handle) {
            return Err(ConnectorError::UnknownTransaction(*handle));
        }

        if fail.load(Ordering::SeqCst) {
            self.failed.fetch_add(1, Ordering::SeqCst);
            return Err(ConnectorError::OperationFailed(format!("{} of {} failed", op, handle)));
        }

        done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Connector for MemoryConnector {
    fn begin_transaction(
        &self,
        isolation_level: IsolationLevel,
        _read_only: bool,
        _auto_commit: bool,
    ) -> Result<ConnectorTransactionHandle> {
        if !self.max_isolation_level.meets_requirement_of(isolation_level) {
            return Err(ConnectorError::UnsupportedIsolationLevel {
                requested: isolation_level,
                supported: self.max_isolation_level,
            });
        }

        let handle = ConnectorTransactionHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.open_transactions.lock().insert(handle);
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn metadata(&self, handle: &ConnectorTransactionHandle) -> Result<Arc<dyn ConnectorMetadata>> {
        if !self.open_transactions.lock().contains(handle) {
            return Err(ConnectorError::UnknownTransaction(*handle));
        }
        Ok(Arc::new(MemoryMetadata {
            schemas: self.schemas.clone(),
        }))
    }

    fn commit(&self, handle: &ConnectorTransactionHandle) -> Result<()> {
        self.finish(handle, &self.fail_commit, &self.committed, "commit")
    }

    fn rollback(&self, handle: &ConnectorTransactionHandle) -> Result<()> {
        self.finish(handle, &self.fail_rollback, &self.rolled_back, "rollback")
    }
}

/// Metadata snapshot taken when the view was requested
struct MemoryMetadata {
    schemas: BTreeMap<String, Vec<String>>,
}

impl ConnectorMetadata for MemoryMetadata {
    fn list_schema_names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }

    fn list_tables(&self, schema: &str) -> Vec<String> {
        self.schemas.get(schema).cloned().unwrap_or_default()
    }
}
