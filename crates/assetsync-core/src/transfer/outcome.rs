//! Completion side of a transfer: progress stream plus exactly one outcome.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use tokio::sync::{oneshot, watch};

use crate::error::{AssetError, Result};

use super::handle::TransferHandle;
use super::progress::TransferProgress;

/// Terminal result of a transfer. Every transfer resolves to exactly one.
#[derive(Debug)]
pub enum TransferOutcome<T> {
    Completed(T),
    Cancelled,
    Failed(AssetError),
}

impl<T> TransferOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferOutcome::Cancelled)
    }

    /// `Cancelled` becomes `Err(AssetError::Cancelled)`.
    pub fn into_result(self) -> Result<T> {
        match self {
            TransferOutcome::Completed(v) => Ok(v),
            TransferOutcome::Cancelled => Err(AssetError::Cancelled),
            TransferOutcome::Failed(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TransferOutcome<U> {
        match self {
            TransferOutcome::Completed(v) => TransferOutcome::Completed(f(v)),
            TransferOutcome::Cancelled => TransferOutcome::Cancelled,
            TransferOutcome::Failed(e) => TransferOutcome::Failed(e),
        }
    }
}

impl<T> From<Result<T>> for TransferOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(v) => TransferOutcome::Completed(v),
            Err(AssetError::Cancelled) => TransferOutcome::Cancelled,
            Err(e) => TransferOutcome::Failed(e),
        }
    }
}

/// A submitted request: handle for control, progress for observation, and
/// the outcome future (also reachable via `.await` on the transfer itself).
pub struct Transfer<T> {
    handle: TransferHandle,
    progress: watch::Receiver<TransferProgress>,
    outcome: oneshot::Receiver<TransferOutcome<T>>,
}

impl<T> Transfer<T> {
    pub(crate) fn new(
        handle: TransferHandle,
        progress: watch::Receiver<TransferProgress>,
        outcome: oneshot::Receiver<TransferOutcome<T>>,
    ) -> Self {
        Self {
            handle,
            progress,
            outcome,
        }
    }

    /// A transfer that is already complete (e.g. served from the cache).
    pub(crate) fn ready(handle: TransferHandle, value: T) -> Self {
        let (_progress_tx, progress) = watch::channel(TransferProgress::default());
        let (tx, outcome) = oneshot::channel();
        let _ = tx.send(TransferOutcome::Completed(value));
        Self::new(handle, progress, outcome)
    }

    pub fn handle(&self) -> &TransferHandle {
        &self.handle
    }

    /// Latest progress; use `changed().await` on the receiver to follow it.
    pub fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress.clone()
    }

    /// Wait for the outcome. A job dropped without resolving (scheduler torn
    /// down mid-flight) reports `Cancelled`.
    pub async fn outcome(self) -> TransferOutcome<T> {
        self.outcome.await.unwrap_or(TransferOutcome::Cancelled)
    }
}

impl<T> fmt::Debug for Transfer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("handle", &self.handle)
            .field("progress", &*self.progress.borrow())
            .finish()
    }
}

impl<T: Send + 'static> IntoFuture for Transfer<T> {
    type Output = TransferOutcome<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = TransferOutcome<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.outcome())
    }
}
