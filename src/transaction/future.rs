// Completion handle returned by asynchronous commit and abort

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::transaction::error::Result;

#[derive(Default)]
struct Slot {
    outcome: Option<Result<()>>,
    wakers: Vec<Waker>,
    /// Completed with `Ok(())` once this future resolves, whatever its outcome
    followers: Vec<TransactionFuture>,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Resolves once a transaction has been finalized and removed from the store.
///
/// Cloning yields another handle on the same outcome, which is how concurrent
/// finalize requests join the one already in flight. The handle can be
/// awaited or waited on from a plain thread.
#[derive(Clone, Default)]
pub struct TransactionFuture {
    shared: Arc<Shared>,
}

impl TransactionFuture {
    pub(crate) fn pending() -> Self {
        Self::default()
    }

    pub(crate) fn completed(result: Result<()>) -> Self {
        let future = Self::pending();
        future.complete(result);
        future
    }

    /// Store the outcome and wake every waiter. Only the first call has an effect.
    pub(crate) fn complete(&self, result: Result<()>) {
        let (wakers, followers) = {
            let mut slot = self.shared.slot.lock();
            if slot.outcome.is_some() {
                return;
            }
            slot.outcome = Some(result);
            (std::mem::take(&mut slot.wakers), std::mem::take(&mut slot.followers))
        };
        self.shared.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for follower in followers {
            follower.complete(Ok(()));
        }
    }

    /// A future that resolves to `Ok(())` when this one resolves, discarding
    /// its outcome
    pub(crate) fn settled(&self) -> TransactionFuture {
        let mut slot = self.shared.slot.lock();
        if slot.outcome.is_some() {
            return Self::completed(Ok(()));
        }
        let follower = Self::pending();
        slot.followers.push(follower.clone());
        follower
    }

    pub fn is_done(&self) -> bool {
        self.shared.slot.lock().outcome.is_some()
    }

    /// Block the current thread until the outcome is available
    pub fn wait(&self) -> Result<()> {
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(outcome) = &slot.outcome {
                return outcome.clone();
            }
            self.shared.ready.wait(&mut slot);
        }
    }

    /// Like `wait`, but gives up after `timeout` and returns `None`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let mut slot = self.shared.slot.lock();
        if slot.outcome.is_none() {
            self.shared.ready.wait_while_for(&mut slot, |slot| slot.outcome.is_none(), timeout);
        }
        slot.outcome.clone()
    }
}

impl Future for TransactionFuture {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.slot.lock();
        match &slot.outcome {
            Some(outcome) => Poll::Ready(outcome.clone()),
            None => {
                if !slot.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    slot.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl std::fmt::Debug for TransactionFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionFuture")
            .field("done", &self.is_done())
            .finish()
    }
}
