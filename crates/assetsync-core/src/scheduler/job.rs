//! Type-erased jobs. Each resolves its outcome channel exactly once: either
//! by running (`run`) or by being dropped from the queue (`cancel`).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::transfer::{HandleShared, TransferIo, TransferOutcome, TransferState};

pub(crate) type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub(crate) trait ErasedJob: Send {
    fn run(self: Box<Self>, io: TransferIo) -> JobFuture;
    fn cancel(self: Box<Self>);
}

pub(crate) struct TypedJob<T, F> {
    pub(crate) handle: Arc<HandleShared>,
    pub(crate) work: F,
    pub(crate) done: oneshot::Sender<TransferOutcome<T>>,
}

impl<T, F, Fut> ErasedJob for TypedJob<T, F>
where
    T: Send + 'static,
    F: FnOnce(TransferIo) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    fn run(self: Box<Self>, io: TransferIo) -> JobFuture {
        let TypedJob { handle, work, done } = *self;
        Box::pin(async move {
            let outcome = TransferOutcome::from(work(io).await);
            let state = match &outcome {
                TransferOutcome::Completed(_) => TransferState::Completed,
                TransferOutcome::Cancelled => TransferState::Cancelled,
                TransferOutcome::Failed(e) => {
                    tracing::debug!(transfer = %handle.id, error = %e, "transfer failed");
                    TransferState::Failed
                }
            };
            handle.set_state(state);
            if done.send(outcome).is_err() {
                tracing::trace!(transfer = %handle.id, "outcome receiver dropped");
            }
        })
    }

    fn cancel(self: Box<Self>) {
        let TypedJob { handle, done, .. } = *self;
        handle.set_state(TransferState::Cancelled);
        let _ = done.send(TransferOutcome::Cancelled);
    }
}
