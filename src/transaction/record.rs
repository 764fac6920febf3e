// Live transaction record
// Owned by the transaction store. Lifecycle state lives in an atomic so that
// claims are a single compare-and-swap; the catalog bindings sit behind a
// short-lived mutex that is never held across connector calls.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;

use crate::catalog::name::CatalogName;
use crate::common::types::{IsolationLevel, TransactionId};
use crate::connector::{Connector, ConnectorMetadata, ConnectorTransactionHandle};
use crate::transaction::error::{Result, TransactionError};
use crate::transaction::future::TransactionFuture;
use crate::transaction::state::{AtomicTransactionState, TransactionState};

/// Connector transaction opened for one catalog-family member
#[derive(Clone)]
pub(crate) struct CatalogBinding {
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) handle: ConnectorTransactionHandle,
    pub(crate) metadata: Arc<dyn ConnectorMetadata>,
}

/// Mutable part of a record, guarded by `TransactionRecord::inner`
#[derive(Default)]
pub(crate) struct RecordInner {
    /// Member name -> binding, in binding order
    pub(crate) bindings: LinkedHashMap<CatalogName, CatalogBinding>,
    pub(crate) written_catalog: Option<CatalogName>,
    pub(crate) idle_since: Option<Instant>,
    /// Installed by whoever claims the record for commit or abort
    pub(crate) completion: Option<TransactionFuture>,
}

/// Outcome of trying to claim a record for finalization
pub(crate) enum Claim {
    /// This caller owns the finalization and must drive it
    Won {
        future: TransactionFuture,
        bindings: Vec<(CatalogName, CatalogBinding)>,
        written_catalog: Option<CatalogName>,
    },
    /// Someone else already claimed it. `state` says which kind of
    /// finalization owns `future`.
    Joined {
        future: TransactionFuture,
        state: TransactionState,
    },
    /// The record is in a state the claim does not start from
    Rejected(TransactionState),
}

/// Result of attaching freshly begun connector transactions
pub(crate) enum Attach {
    Attached,
    /// Another caller bound the family first; the given bindings were not used
    AlreadyBound(Vec<(CatalogName, CatalogBinding)>),
    /// The record left the open states; the given bindings were not used
    Closed(Vec<(CatalogName, CatalogBinding)>, TransactionState),
}

pub struct TransactionRecord {
    id: TransactionId,
    auto_commit: bool,
    isolation_level: IsolationLevel,
    read_only: bool,
    created_at: SystemTime,
    state: AtomicTransactionState,
    inner: Mutex<RecordInner>,
}

impl TransactionRecord {
    pub(crate) fn new(id: TransactionId, isolation_level: IsolationLevel, read_only: bool, auto_commit: bool) -> Self {
        Self {
            id,
            auto_commit,
            isolation_level,
            read_only,
            created_at: SystemTime::now(),
            state: AtomicTransactionState::new(TransactionState::Active),
            inner: Mutex::new(RecordInner::default()),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn state(&self) -> TransactionState {
        self.state.load()
    }

    pub(crate) fn inner(&self) -> parking_lot::MutexGuard<'_, RecordInner> {
        self.inner.lock()
    }

    /// Error a caller gets when touching a record in `state`
    pub(crate) fn state_error(&self, state: TransactionState) -> TransactionError {
        match state {
            TransactionState::Failed => TransactionError::TransactionAlreadyAborted(self.id),
            _ => TransactionError::TransactionFinishing(self.id),
        }
    }

    /// Fail unless catalog access is currently allowed
    pub(crate) fn check_open(&self) -> Result<()> {
        let state = self.state();
        if state.is_open() {
            Ok(())
        } else {
            Err(self.state_error(state))
        }
    }

    /// Reactivate an inactive record; no-op if already active
    pub(crate) fn set_active(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match self.state.transition(&[TransactionState::Inactive], TransactionState::Active) {
            Ok(_) => {
                inner.idle_since = None;
                Ok(())
            }
            Err(TransactionState::Active) => Ok(()),
            Err(state) => Err(self.state_error(state)),
        }
    }

    /// Mark an active record inactive and start its idle clock
    pub(crate) fn set_inactive(&self) -> bool {
        let mut inner = self.inner.lock();
        match self.state.transition(&[TransactionState::Active], TransactionState::Inactive) {
            Ok(_) => {
                inner.idle_since = Some(Instant::now());
                true
            }
            Err(_) => false,
        }
    }

    /// Move to FAILED. Already failed or finishing records are left alone.
    pub(crate) fn fail(&self) -> TransactionState {
        match self.state.transition(
            &[TransactionState::Active, TransactionState::Inactive],
            TransactionState::Failed,
        ) {
            Ok(_) => TransactionState::Failed,
            Err(state) => state,
        }
    }

    /// How long the record has been inactive, if it is inactive
    #[cfg(test)]
    pub(crate) fn idle_time(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        if self.state() != TransactionState::Inactive {
            return None;
        }
        inner.idle_since.map(|since| since.elapsed())
    }

    pub(crate) fn is_bound(&self, catalog: &CatalogName) -> bool {
        self.inner.lock().bindings.contains_key(catalog)
    }

    pub(crate) fn binding(&self, catalog: &str) -> Option<CatalogBinding> {
        self.inner.lock().bindings.get(catalog).cloned()
    }

    /// Append the bindings of one catalog family, in the given order
    pub(crate) fn attach(&self, bindings: Vec<(CatalogName, CatalogBinding)>) -> Attach {
        let mut inner = self.inner.lock();

        let state = self.state();
        if !state.is_open() {
            return Attach::Closed(bindings, state);
        }
        if bindings.iter().any(|(name, _)| inner.bindings.contains_key(name)) {
            return Attach::AlreadyBound(bindings);
        }

        for (name, binding) in bindings {
            inner.bindings.insert(name, binding);
        }
        Attach::Attached
    }

    /// Record that `catalog` (a family primary) performed a write
    pub(crate) fn record_write(&self, catalog: &CatalogName) -> Result<()> {
        let mut inner = self.inner.lock();

        let state = self.state();
        if !state.is_open() {
            return Err(self.state_error(state));
        }
        if !inner.bindings.contains_key(catalog) {
            return Err(TransactionError::CatalogNotBound {
                id: self.id,
                catalog: catalog.clone(),
            });
        }
        if self.read_only {
            return Err(TransactionError::ReadOnlyViolation(self.id));
        }

        if let Some(written) = &inner.written_catalog {
            if written != catalog {
                return Err(TransactionError::MultiCatalogWriteConflict {
                    id: self.id,
                    written: written.clone(),
                    attempted: catalog.clone(),
                });
            }
            return Ok(());
        }
        inner.written_catalog = Some(catalog.clone());
        Ok(())
    }

    /// Claim the record for finalization by moving it from one of `from` to
    /// `to`, provided `eligible` holds. The transition and the installation
    /// of the shared completion happen in one critical section, so anyone
    /// who sees a finishing state also sees its future.
    pub(crate) fn claim(
        &self,
        from: &[TransactionState],
        to: TransactionState,
        eligible: impl Fn(&RecordInner) -> bool,
    ) -> Claim {
        let mut inner = self.inner.lock();

        let current = self.state();
        if current.is_finishing() {
            return match &inner.completion {
                Some(future) => Claim::Joined {
                    future: future.clone(),
                    state: current,
                },
                None => Claim::Rejected(current),
            };
        }
        if !eligible(&*inner) {
            return Claim::Rejected(current);
        }

        match self.state.transition(from, to) {
            Ok(_) => {
                let future = TransactionFuture::pending();
                inner.completion = Some(future.clone());
                inner.idle_since = None;
                let bindings = inner
                    .bindings
                    .iter()
                    .map(|(name, binding)| (name.clone(), binding.clone()))
                    .collect();
                Claim::Won {
                    future,
                    bindings,
                    written_catalog: inner.written_catalog.clone(),
                }
            }
            Err(state) => Claim::Rejected(state),
        }
    }
}


#[cfg(test)]
impl Attach {
    fn is_closed(&self) -> bool {
        matches!(self, Attach::Closed(..))
    }
}
