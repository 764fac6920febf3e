// Bayun Multi-Catalog Transaction Manager

pub mod catalog;
pub mod common;
pub mod connector;
pub mod transaction;

// Re-export key items for convenient access
pub use catalog::{CatalogFamily, CatalogManager, CatalogName, CatalogRegistry};
pub use common::types::{IsolationLevel, TransactionId};
pub use connector::{Connector, ConnectorMetadata, ConnectorTransactionHandle};
pub use transaction::{
    CatalogMetadata, TransactionError, TransactionFuture, TransactionInfo, TransactionManager,
    TransactionManagerConfig, TransactionState,
};
