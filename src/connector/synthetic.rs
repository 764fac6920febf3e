// Synthetic sibling connectors
// Every registered catalog gets a metadata-introspection view and a
// system-tables view. Neither holds data of its own, but each takes part in
// the catalog's transaction through its own handle.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::catalog::name::CatalogName;
use crate::common::types::IsolationLevel;
use crate::connector::{
    Connector, ConnectorError, ConnectorMetadata, ConnectorTransactionHandle, Result,
};

/// Which sibling view a synthetic connector provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingKind {
    InformationSchema,
    SystemTables,
}

impl SiblingKind {
    fn schema(&self) -> &'static str {
        match self {
            SiblingKind::InformationSchema => "information_schema",
            SiblingKind::SystemTables => "runtime",
        }
    }

    fn tables(&self) -> &'static [&'static str] {
        match self {
            SiblingKind::InformationSchema => &["columns", "schemata", "tables", "views"],
            SiblingKind::SystemTables => &["nodes", "queries", "transactions"],
        }
    }
}

/// Metadata-only connector standing in for a catalog's sibling views
pub struct SyntheticConnector {
    kind: SiblingKind,
    catalog: CatalogName,
    next_handle: AtomicU64,
    open_transactions: Mutex<HashSet<ConnectorTransactionHandle>>,
}

impl SyntheticConnector {
    pub fn new(kind: SiblingKind, catalog: CatalogName) -> Self {
        Self {
            kind,
            catalog,
            next_handle: AtomicU64::new(1),
            open_transactions: Mutex::new(HashSet::new()),
        }
    }

    pub fn kind(&self) -> SiblingKind {
        self.kind
    }

    /// Catalog whose sibling this connector is
    pub fn catalog(&self) -> &CatalogName {
        &self.catalog
    }

    pub fn open_transaction_count(&self) -> usize {
        self.open_transactions.lock().len()
    }

    fn close(&self, handle: &ConnectorTransactionHandle) -> Result<()> {
        if self.open_transactions.lock().remove(handle) {
            Ok(())
        } else {
            Err(ConnectorError::UnknownTransaction(*handle))
        }
    }
}

impl Connector for SyntheticConnector {
    fn begin_transaction(
        &self,
        _isolation_level: IsolationLevel,
        _read_only: bool,
        _auto_commit: bool,
    ) -> Result<ConnectorTransactionHandle> {
        let handle = ConnectorTransactionHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.open_transactions.lock().insert(handle);
        Ok(handle)
    }

    fn metadata(&self, handle: &ConnectorTransactionHandle) -> Result<Arc<dyn ConnectorMetadata>> {
        if !self.open_transactions.lock().contains(handle) {
            return Err(ConnectorError::UnknownTransaction(*handle));
        }
        Ok(Arc::new(SyntheticMetadata { kind: self.kind }))
    }

    fn commit(&self, handle: &ConnectorTransactionHandle) -> Result<()> {
        self.close(handle)
    }

    fn rollback(&self, handle: &ConnectorTransactionHandle) -> Result<()> {
        self.close(handle)
    }
}

struct SyntheticMetadata {
    kind: SiblingKind,
}

impl ConnectorMetadata for SyntheticMetadata {
    fn list_schema_names(&self) -> Vec<String> {
        vec![self.kind.schema().to_string()]
    }

    fn list_tables(&self, schema: &str) -> Vec<String> {
        if schema == self.kind.schema() {
            self.kind.tables().iter().map(|t| t.to_string()).collect()
        } else {
            Vec::new()
        }
    }
}
