// Transaction Management Module
//
// Lifecycle of multi-catalog transactions: the store of live records, lazy
// catalog binding, commit/abort fan-out and idle expiration.

pub mod binder;
pub mod config;
pub mod error;
pub mod finalizer;
pub mod future;
pub mod info;
pub mod manager;
pub mod pool;
pub mod reaper;
pub mod record;
pub mod state;
pub mod store;

// Public exports
pub use binder::CatalogMetadata;
pub use config::TransactionManagerConfig;
pub use error::{Result, TransactionError};
pub use future::TransactionFuture;
pub use info::TransactionInfo;
pub use manager::TransactionManager;
pub use state::TransactionState;
