use thiserror::Error;

use crate::catalog::name::CatalogName;
use crate::common::types::TransactionId;
use crate::connector::ConnectorError;

/// Errors that can occur during transaction processing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Unknown transaction ID: {0}. Possibly expired? Commands ignored until end of transaction block")]
    TransactionNotFound(TransactionId),

    #[error("Current transaction {0} is aborted, commands ignored until end of transaction block")]
    TransactionAlreadyAborted(TransactionId),

    #[error("Transaction {0} is already being committed or aborted")]
    TransactionFinishing(TransactionId),

    #[error("Catalog '{0}' not found")]
    CatalogNotFound(String),

    #[error("Multi-catalog writes not supported in a single transaction {id}. Already wrote to catalog {written}, attempted write to {attempted}")]
    MultiCatalogWriteConflict {
        id: TransactionId,
        written: CatalogName,
        attempted: CatalogName,
    },

    #[error("Cannot execute write in read-only transaction {0}")]
    ReadOnlyViolation(TransactionId),

    #[error("Cannot record write for catalog {catalog} not part of transaction {id}")]
    CatalogNotBound { id: TransactionId, catalog: CatalogName },

    #[error("Connector operation failed for catalog {catalog}: {source}")]
    ConnectorOperationFailure {
        catalog: CatalogName,
        #[source]
        source: ConnectorError,
    },

    #[error("Transaction id space exhausted")]
    IdExhausted,

    #[error("Invalid transaction manager configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal transaction error: {0}")]
    Internal(String),
}

impl TransactionError {
    /// Stable error code for this kind of failure
    pub fn error_code(&self) -> &'static str {
        match self {
            TransactionError::TransactionNotFound(_) => "UNKNOWN_TRANSACTION",
            TransactionError::TransactionAlreadyAborted(_) => "TRANSACTION_ALREADY_ABORTED",
            TransactionError::TransactionFinishing(_) => "TRANSACTION_ALREADY_FINISHING",
            TransactionError::CatalogNotFound(_) => "CATALOG_NOT_FOUND",
            TransactionError::MultiCatalogWriteConflict { .. } => "MULTI_CATALOG_WRITE_CONFLICT",
            TransactionError::ReadOnlyViolation(_) => "READ_ONLY_VIOLATION",
            TransactionError::CatalogNotBound { .. } => "CATALOG_NOT_BOUND",
            TransactionError::ConnectorOperationFailure { .. } => "CONNECTOR_OPERATION_FAILURE",
            TransactionError::IdExhausted => "TRANSACTION_ID_EXHAUSTED",
            TransactionError::InvalidConfig(_) => "INVALID_CONFIGURATION",
            TransactionError::Internal(_) => "GENERIC_INTERNAL_ERROR",
        }
    }
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;
