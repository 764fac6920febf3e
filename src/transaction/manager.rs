use std::sync::Arc;

use log::info;
use parking_lot::Mutex;

use crate::catalog::registry::CatalogRegistry;
use crate::common::types::{IsolationLevel, TransactionId};
use crate::connector::ConnectorTransactionHandle;
use crate::transaction::binder::{CatalogBinder, CatalogMetadata};
use crate::transaction::config::TransactionManagerConfig;
use crate::transaction::error::{Result, TransactionError};
use crate::transaction::finalizer::Finalizer;
use crate::transaction::future::TransactionFuture;
use crate::transaction::info::TransactionInfo;
use crate::transaction::pool::FinishingPool;
use crate::transaction::reaper::IdleReaper;
use crate::transaction::record::TransactionRecord;
use crate::transaction::state::TransactionState;
use crate::transaction::store::TransactionStore;

/// Transaction manager - creates, tracks and finalizes multi-catalog transactions
pub struct TransactionManager {
    config: TransactionManagerConfig,

    /// Live transactions
    store: Arc<TransactionStore>,

    binder: CatalogBinder,
    finalizer: Arc<Finalizer>,

    /// Worker threads running connector commit and rollback
    pool: Arc<FinishingPool>,

    /// Idle-check timer, `None` once shut down
    reaper: Mutex<Option<IdleReaper>>,
}

impl TransactionManager {
    /// Create a new transaction manager and start its background workers
    pub fn new(config: TransactionManagerConfig, registry: Arc<dyn CatalogRegistry>) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(TransactionStore::new());
        let pool = Arc::new(FinishingPool::start(config.max_finishing_concurrency)?);
        let finalizer = Arc::new(Finalizer::new(store.clone(), pool.clone()));
        let reaper = IdleReaper::start(
            store.clone(),
            finalizer.clone(),
            config.idle_timeout,
            config.idle_check_interval,
        )?;

        Ok(Self {
            config,
            store,
            binder: CatalogBinder::new(registry),
            finalizer,
            pool,
            reaper: Mutex::new(Some(reaper)),
        })
    }

    pub fn config(&self) -> &TransactionManagerConfig {
        &self.config
    }

    /// Begin a new transaction with the default isolation level
    pub fn begin(&self, auto_commit: bool) -> Result<TransactionId> {
        self.begin_with(IsolationLevel::default(), false, auto_commit)
    }

    /// Begin a new transaction
    pub fn begin_with(&self, isolation_level: IsolationLevel, read_only: bool, auto_commit: bool) -> Result<TransactionId> {
        let id = TransactionId::allocate().ok_or(TransactionError::IdExhausted)?;
        let record = TransactionRecord::new(id, isolation_level, read_only, auto_commit);
        self.store.insert(Arc::new(record));
        Ok(id)
    }

    /// Check if a transaction exists
    pub fn transaction_exists(&self, id: TransactionId) -> bool {
        self.store.contains(id)
    }

    pub fn is_auto_commit(&self, id: TransactionId) -> Result<bool> {
        Ok(self.record(id)?.is_auto_commit())
    }

    pub fn get_transaction_info(&self, id: TransactionId) -> Result<TransactionInfo> {
        let record = self.record(id)?;
        Ok(TransactionInfo::capture(&record))
    }

    /// Snapshots of every live transaction, ordered by id
    pub fn get_all_transaction_infos(&self) -> Vec<TransactionInfo> {
        self.store
            .records()
            .iter()
            .map(|record| TransactionInfo::capture(record))
            .collect()
    }

    /// Reactivate an inactive transaction before serving a request on it
    pub fn check_and_set_active(&self, id: TransactionId) -> Result<()> {
        self.record(id)?.set_active()
    }

    /// Mark a transaction eligible for idle reaping. Only active transactions
    /// become inactive.
    pub fn try_set_inactive(&self, id: TransactionId) -> bool {
        self.store.get(id).map_or(false, |record| record.set_inactive())
    }

    /// Metadata of the catalog family owning `catalog_name`, binding it to the
    /// transaction on first use
    pub fn get_catalog_metadata(&self, id: TransactionId, catalog_name: &str) -> Result<CatalogMetadata> {
        self.get_optional_catalog_metadata(id, catalog_name)?
            .ok_or_else(|| TransactionError::CatalogNotFound(catalog_name.to_string()))
    }

    /// Like `get_catalog_metadata`, but an unregistered catalog yields `None`
    pub fn get_optional_catalog_metadata(&self, id: TransactionId, catalog_name: &str) -> Result<Option<CatalogMetadata>> {
        let record = self.record(id)?;
        self.binder.bind(&record, catalog_name)
    }

    /// Catalog metadata for a caller about to write to `catalog_name`
    pub fn get_catalog_metadata_for_write(&self, id: TransactionId, catalog_name: &str) -> Result<CatalogMetadata> {
        let metadata = self.get_catalog_metadata(id, catalog_name)?;
        self.check_connector_write(id, catalog_name)?;
        Ok(metadata)
    }

    /// Record that the family owning `catalog_name` is about to be written.
    /// Only one catalog family may be written per transaction.
    pub fn check_connector_write(&self, id: TransactionId, catalog_name: &str) -> Result<()> {
        let record = self.record(id)?;
        record.check_open()?;
        let family = self
            .binder
            .lookup(catalog_name)
            .ok_or_else(|| TransactionError::CatalogNotFound(catalog_name.to_string()))?;
        record.record_write(family.name())?;
        record.set_active()
    }

    /// Connector transaction of `catalog_name` (primary or sibling name)
    pub fn get_connector_transaction(&self, id: TransactionId, catalog_name: &str) -> Result<ConnectorTransactionHandle> {
        self.get_catalog_metadata(id, catalog_name)?
            .transaction_handle_for(catalog_name)
            .ok_or_else(|| TransactionError::CatalogNotFound(catalog_name.to_string()))
    }

    /// Commit asynchronously. The future resolves after the transaction has
    /// been removed; it fails if any connector failed to commit.
    pub fn async_commit(&self, id: TransactionId) -> TransactionFuture {
        match self.record(id).and_then(|record| self.finalizer.commit(&record)) {
            Ok(future) => future,
            Err(e) => TransactionFuture::completed(Err(e)),
        }
    }

    /// Abort asynchronously. Connector rollback failures are logged, never
    /// surfaced; the future resolves after the transaction has been removed.
    pub fn async_abort(&self, id: TransactionId) -> TransactionFuture {
        match self.record(id).and_then(|record| self.finalizer.abort(&record)) {
            Ok(future) => future,
            Err(e) => TransactionFuture::completed(Err(e)),
        }
    }

    /// Mark a transaction as failed without removing it. Only an explicit
    /// abort ends a failed transaction.
    pub fn fail(&self, id: TransactionId) -> Result<()> {
        let record = self.record(id)?;
        if record.fail() == TransactionState::Failed {
            info!("Transaction {} marked as failed", id);
        }
        Ok(())
    }

    /// Stop the idle reaper and drain the finishing pool. Idempotent.
    pub fn shutdown(&self) {
        let reaper = self.reaper.lock().take();
        if let Some(mut reaper) = reaper {
            reaper.stop();
        }
        self.pool.shutdown();
    }

    fn record(&self, id: TransactionId) -> Result<Arc<TransactionRecord>> {
        self.store.get(id).ok_or(TransactionError::TransactionNotFound(id))
    }
}

impl Drop for TransactionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
