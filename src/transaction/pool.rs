// Finishing worker pool
// Fixed set of named threads that run connector commit and rollback work off
// the caller's thread.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use log::error;
use parking_lot::Mutex;

use crate::transaction::error::{Result, TransactionError};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct FinishingPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl FinishingPool {
    /// Spawn `threads` workers
    pub(crate) fn start(threads: usize) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);

        for i in 0..threads {
            let rx = rx.clone();
            let worker = thread::Builder::new()
                .name(format!("transaction-finishing-{}", i))
                .spawn(move || {
                    // Runs until the channel is closed and drained
                    while let Ok(job) = rx.recv() {
                        run_job(job);
                    }
                })
                .map_err(|e| TransactionError::Internal(format!("failed to spawn finishing worker: {}", e)))?;
            workers.push(worker);
        }

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    /// Queue `job` for a worker. After shutdown the job runs on the calling thread.
    pub(crate) fn execute(&self, job: impl FnOnce() + Send + 'static) {
        let job: Job = Box::new(job);
        let sender = self.sender.lock().clone();
        match sender {
            Some(sender) => {
                if let Err(rejected) = sender.send(job) {
                    run_job(rejected.into_inner());
                }
            }
            None => run_job(job),
        }
    }

    /// Close the queue, let workers drain it and join them
    pub(crate) fn shutdown(&self) {
        drop(self.sender.lock().take());

        let workers = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                error!("Transaction finishing worker panicked");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Drop for FinishingPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("Transaction finishing job panicked");
    }
}
