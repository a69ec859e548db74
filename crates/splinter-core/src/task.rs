//! Cancellable background passes on the rayon pool.
//!
//! A pass runs a closure on a worker thread and reports one result through a
//! bounded channel. The owner polls with [`PassHandle::try_take`] from its
//! update loop or blocks with [`PassHandle::wait`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, TryRecvError};

use crate::error::{Error, Result};

/// Shared cancellation flag checked by long-running passes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Observed at the pass's next check.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Handle to a pass started with [`spawn_pass`].
#[derive(Debug)]
pub struct PassHandle<T> {
    name: &'static str,
    cancel: CancelToken,
    result_rx: Receiver<Result<T>>,
}

impl<T> PassHandle<T> {
    /// Name the pass was spawned with.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The token this pass observes.
    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Non-blocking poll. `Ok(None)` while the pass is still running.
    pub fn try_take(&self) -> Result<Option<T>> {
        match self.result_rx.try_recv() {
            Ok(result) => result.map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::WorkerDisconnected),
        }
    }

    /// Block until the pass reports.
    pub fn wait(self) -> Result<T> {
        self.result_rx
            .recv()
            .map_err(|_| Error::WorkerDisconnected)?
    }
}

/// Run `job` on the rayon pool.
///
/// The job returns `None` when it stopped early because the token was
/// cancelled; the handle then reports [`Error::Cancelled`].
pub fn spawn_pass<T, F>(name: &'static str, cancel: CancelToken, job: F) -> PassHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Option<T> + Send + 'static,
{
    let (result_tx, result_rx) = bounded(1);
    let token = cancel.clone();

    rayon::spawn(move || {
        let _span = tracing::trace_span!("pass", name).entered();
        let result = if token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            job(&token).ok_or(Error::Cancelled)
        };
        if result.is_err() {
            tracing::debug!(name, "pass cancelled");
        }
        // Receiver may already be gone if the owner dropped the handle.
        let _ = result_tx.send(result);
    });

    PassHandle {
        name,
        cancel,
        result_rx,
    }
}
