// Idle reaper
// Background thread that aborts transactions left inactive for too long.
// The scan only claims candidates; rollback runs on the finishing pool.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use crossbeam::select;
use log::{error, info};

use crate::transaction::error::{Result, TransactionError};
use crate::transaction::finalizer::Finalizer;
use crate::transaction::store::TransactionStore;

/// Shortest tick the reaper will run at
const MIN_IDLE_CHECK_INTERVAL: Duration = Duration::from_millis(1);

pub(crate) struct IdleReaper {
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl IdleReaper {
    pub(crate) fn start(
        store: Arc<TransactionStore>,
        finalizer: Arc<Finalizer>,
        idle_timeout: Duration,
        idle_check_interval: Duration,
    ) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(idle_check_interval.max(MIN_IDLE_CHECK_INTERVAL));

        let worker = thread::Builder::new()
            .name("transaction-idle-check".to_string())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        reap_expired(&store, &finalizer, idle_timeout);
                    }
                    recv(shutdown_rx) -> _ => break,
                }
            })
            .map_err(|e| TransactionError::Internal(format!("failed to spawn idle reaper: {}", e)))?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Stop the timer thread and wait for it to exit
    pub(crate) fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the loop
        drop(self.shutdown.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Idle reaper thread panicked");
            }
        }
    }
}

impl Drop for IdleReaper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Claim every inactive transaction idle for longer than `idle_timeout`.
/// Returns how many were claimed.
pub(crate) fn reap_expired(store: &TransactionStore, finalizer: &Finalizer, idle_timeout: Duration) -> usize {
    let mut reaped = 0;
    for record in store.records() {
        let claimed = finalizer.abort_if_idle(&record, |inner| {
            inner
                .idle_since
                .map_or(false, |since| idle_timeout.is_zero() || since.elapsed() > idle_timeout)
        });
        if claimed.is_some() {
            info!("Removing expired transaction: {}", record.id());
            reaped += 1;
        }
    }
    reaped
}
