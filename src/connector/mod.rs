//! Connector Contract Module
//!
//! A connector exposes one data source to the engine. The transaction manager
//! only needs four things from it: open a connector-side transaction, hand out
//! a metadata view bound to that transaction, and commit or roll it back.

pub mod memory;
pub mod synthetic;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::common::types::IsolationLevel;

pub use self::memory::{MemoryConnector, MemoryConnectorStats};
pub use self::synthetic::{SiblingKind, SyntheticConnector};

/// Errors reported by a connector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Unknown connector transaction {0}")]
    UnknownTransaction(ConnectorTransactionHandle),

    #[error("Isolation level {requested:?} is not supported (connector supports up to {supported:?})")]
    UnsupportedIsolationLevel {
        requested: IsolationLevel,
        supported: IsolationLevel,
    },

    #[error("Connector operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Opaque token for a transaction open inside one connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectorTransactionHandle(u64);

impl ConnectorTransactionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectorTransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx_{}", self.0)
    }
}

/// Read-only metadata view of a connector, scoped to one connector transaction
pub trait ConnectorMetadata: Send + Sync {
    /// Names of all schemas visible in this transaction
    fn list_schema_names(&self) -> Vec<String>;

    /// Names of the tables in `schema`; empty if the schema does not exist
    fn list_tables(&self, schema: &str) -> Vec<String>;
}

/// A pluggable data source
pub trait Connector: Send + Sync {
    /// Open a connector-side transaction
    fn begin_transaction(
        &self,
        isolation_level: IsolationLevel,
        read_only: bool,
        auto_commit: bool,
    ) -> Result<ConnectorTransactionHandle>;

    /// Metadata view bound to an open transaction
    fn metadata(&self, handle: &ConnectorTransactionHandle) -> Result<Arc<dyn ConnectorMetadata>>;

    fn commit(&self, handle: &ConnectorTransactionHandle) -> Result<()>;

    fn rollback(&self, handle: &ConnectorTransactionHandle) -> Result<()>;
}
