// Finalizer
// Drives commit and abort to completion exactly once per transaction. The
// claim is a compare-and-swap on the record state; the connector work runs
// on the finishing pool, and whichever per-catalog job settles last removes
// the record from the store and resolves the shared future.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{error, warn};
use parking_lot::Mutex;

use crate::catalog::name::CatalogName;
use crate::common::types::TransactionId;
use crate::connector::{self, ConnectorError};
use crate::transaction::error::{Result, TransactionError};
use crate::transaction::future::TransactionFuture;
use crate::transaction::pool::FinishingPool;
use crate::transaction::record::{CatalogBinding, Claim, RecordInner, TransactionRecord};
use crate::transaction::state::TransactionState;
use crate::transaction::store::TransactionStore;

const OPEN_STATES: [TransactionState; 2] = [TransactionState::Active, TransactionState::Inactive];
const ABORTABLE_STATES: [TransactionState; 3] =
    [TransactionState::Active, TransactionState::Inactive, TransactionState::Failed];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Commit,
    Rollback,
}

pub(crate) struct Finalizer {
    store: Arc<TransactionStore>,
    pool: Arc<FinishingPool>,
}

impl Finalizer {
    pub(crate) fn new(store: Arc<TransactionStore>, pool: Arc<FinishingPool>) -> Self {
        Self { store, pool }
    }

    /// Claim `record` for commit, or join a commit already running.
    /// Failed or aborting transactions can only be aborted.
    pub(crate) fn commit(&self, record: &TransactionRecord) -> Result<TransactionFuture> {
        match record.claim(&OPEN_STATES, TransactionState::Committing, |_| true) {
            Claim::Won { future, bindings, written_catalog } => {
                self.start_commit(record.id(), bindings, written_catalog, future.clone());
                Ok(future)
            }
            Claim::Joined { future, state: TransactionState::Committing } => Ok(future),
            Claim::Joined { .. } => Err(TransactionError::TransactionAlreadyAborted(record.id())),
            Claim::Rejected(state) => Err(record.state_error(state)),
        }
    }

    /// Claim `record` for abort, or join the finalization already running.
    /// An abort never reports connector failures, so joining a commit only
    /// waits for it to settle.
    pub(crate) fn abort(&self, record: &TransactionRecord) -> Result<TransactionFuture> {
        match record.claim(&ABORTABLE_STATES, TransactionState::Aborting, |_| true) {
            Claim::Won { future, bindings, .. } => {
                self.start_abort(record.id(), bindings, future.clone());
                Ok(future)
            }
            Claim::Joined { future, state: TransactionState::Aborting } => Ok(future),
            Claim::Joined { future, .. } => Ok(future.settled()),
            Claim::Rejected(state) => Err(record.state_error(state)),
        }
    }

    /// Abort `record` only if it is inactive and `expired` holds. Returns
    /// `None` when the claim was lost to another caller or not eligible.
    pub(crate) fn abort_if_idle(
        &self,
        record: &TransactionRecord,
        expired: impl Fn(&RecordInner) -> bool,
    ) -> Option<TransactionFuture> {
        match record.claim(&[TransactionState::Inactive], TransactionState::Aborting, expired) {
            Claim::Won { future, bindings, .. } => {
                self.start_abort(record.id(), bindings, future.clone());
                Some(future)
            }
            Claim::Joined { .. } | Claim::Rejected(_) => None,
        }
    }

    fn start_commit(
        &self,
        id: TransactionId,
        bindings: Vec<(CatalogName, CatalogBinding)>,
        written_catalog: Option<CatalogName>,
        future: TransactionFuture,
    ) {
        let settlement = Settlement::new(id, self.store.clone(), bindings.len(), true, future);
        if bindings.is_empty() {
            settlement.finish();
            return;
        }

        // The written catalog commits first; the rest only commit if it succeeded
        let (written, rest): (Vec<_>, Vec<_>) = bindings
            .into_iter()
            .partition(|(name, _)| Some(name) == written_catalog.as_ref());

        match written.into_iter().next() {
            Some((name, binding)) => {
                let pool = self.pool.clone();
                self.pool.execute(move || {
                    let committed = settlement.run(&name, &binding, Operation::Commit);
                    let follow_up = if committed { Operation::Commit } else { Operation::Rollback };
                    dispatch(&pool, &settlement, rest, follow_up);
                    settlement.settle_one();
                });
            }
            None => dispatch(&self.pool, &settlement, rest, Operation::Commit),
        }
    }

    fn start_abort(&self, id: TransactionId, bindings: Vec<(CatalogName, CatalogBinding)>, future: TransactionFuture) {
        let settlement = Settlement::new(id, self.store.clone(), bindings.len(), false, future);
        if bindings.is_empty() {
            settlement.finish();
            return;
        }
        dispatch(&self.pool, &settlement, bindings, Operation::Rollback);
    }
}

/// Queue one job per binding
fn dispatch(
    pool: &FinishingPool,
    settlement: &Arc<Settlement>,
    bindings: Vec<(CatalogName, CatalogBinding)>,
    operation: Operation,
) {
    for (name, binding) in bindings {
        let settlement = settlement.clone();
        pool.execute(move || {
            settlement.run(&name, &binding, operation);
            settlement.settle_one();
        });
    }
}

/// Tracks the per-catalog operations of one finalization
struct Settlement {
    id: TransactionId,
    store: Arc<TransactionStore>,
    remaining: AtomicUsize,
    /// Commit surfaces connector failures, abort only logs them
    report_errors: bool,
    first_error: Mutex<Option<TransactionError>>,
    future: TransactionFuture,
}

impl Settlement {
    fn new(
        id: TransactionId,
        store: Arc<TransactionStore>,
        operations: usize,
        report_errors: bool,
        future: TransactionFuture,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            store,
            remaining: AtomicUsize::new(operations),
            report_errors,
            first_error: Mutex::new(None),
            future,
        })
    }

    /// Run one connector operation. Returns true if it succeeded.
    fn run(&self, catalog: &CatalogName, binding: &CatalogBinding, operation: Operation) -> bool {
        let outcome = invoke(|| match operation {
            Operation::Commit => binding.connector.commit(&binding.handle),
            Operation::Rollback => binding.connector.rollback(&binding.handle),
        });

        let source = match outcome {
            Ok(()) => return true,
            Err(source) => source,
        };

        if self.report_errors {
            error!("{:?} of catalog {} failed for transaction {}: {}", operation, catalog, self.id, source);
            let mut first_error = self.first_error.lock();
            if first_error.is_none() {
                *first_error = Some(TransactionError::ConnectorOperationFailure {
                    catalog: catalog.clone(),
                    source,
                });
            }
        } else {
            warn!("Rollback of catalog {} failed for transaction {}: {}", catalog, self.id, source);
        }
        false
    }

    fn settle_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.finish();
        }
    }

    /// Remove the record, then resolve the future
    fn finish(&self) {
        self.store.remove(self.id);
        let result = match self.first_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        };
        self.future.complete(result);
    }
}

/// Call into a connector, turning a panic into an operation failure
fn invoke(operation: impl FnOnce() -> connector::Result<()>) -> connector::Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::OperationFailed("connector panicked".to_string())),
    }
}
