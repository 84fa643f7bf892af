//! Transfer scheduler.
//!
//! A bounded pool of worker slots fed by one priority queue. Jobs are ordered
//! by (priority desc, submission order asc); queued jobs can be re-prioritized
//! or cancelled, running jobs can only be asked to abort at their next
//! checkpoint. All queue and cancellation state lives behind a single lock
//! that is never held across an await.

mod dispatch;
mod job;
mod queue;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;

use crate::error::{AssetError, Result};
use crate::model::AssetId;
use crate::transfer::{
    CancelStatus, Direction, HandleShared, Priority, Transfer, TransferHandle, TransferId,
    TransferIo, TransferProgress, TransferState,
};

use self::job::{ErasedJob, TypedJob};
use self::queue::JobQueue;

/// Default number of concurrently running transfers.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

pub(crate) struct QueuedJob {
    handle: Arc<HandleShared>,
    progress: watch::Sender<TransferProgress>,
    job: Box<dyn ErasedJob>,
}

struct SchedulerState {
    queue: JobQueue<QueuedJob>,
    running: HashMap<TransferId, Arc<HandleShared>>,
    shutting_down: bool,
}

/// State shared by the scheduler, its dispatcher task and (weakly) every handle.
pub(crate) struct SchedulerShared {
    state: Mutex<SchedulerState>,
    wakeup: Notify,
    next_id: AtomicU64,
    progress_step: f64,
}

impl SchedulerShared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(&self) -> TransferId {
        TransferId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    pub(crate) fn reprioritize(&self, id: TransferId, priority: Priority) -> bool {
        let mut state = self.lock();
        let Some(handle) = state.queue.get(id).map(|q| Arc::clone(&q.handle)) else {
            return false;
        };
        if !state.queue.reprioritize(id, priority) {
            return false;
        }
        handle.set_priority(priority);
        tracing::debug!(transfer = %id, ?priority, "queued transfer re-prioritized");
        true
    }

    pub(crate) fn cancel(&self, id: TransferId) -> CancelStatus {
        let dequeued = {
            let mut state = self.lock();
            match state.queue.remove(id) {
                Some(queued) => queued,
                None => {
                    return match state.running.get(&id) {
                        Some(handle) => {
                            handle.request_abort();
                            tracing::debug!(transfer = %id, "abort requested for running transfer");
                            CancelStatus::AbortRequested
                        }
                        None => CancelStatus::Finished,
                    };
                }
            }
        };
        dequeued.handle.request_abort();
        dequeued.job.cancel();
        tracing::debug!(transfer = %id, "queued transfer cancelled");
        CancelStatus::Dequeued
    }

    fn claim_next(&self) -> Option<QueuedJob> {
        let mut state = self.lock();
        if state.shutting_down {
            return None;
        }
        let (id, queued) = state.queue.pop()?;
        queued.handle.set_state(TransferState::Running);
        state.running.insert(id, Arc::clone(&queued.handle));
        Some(queued)
    }

    fn finish_running(&self, id: TransferId) {
        self.lock().running.remove(&id);
    }

    /// Stop accepting work, abort running jobs and hand back everything queued.
    fn begin_shutdown(&self) -> Vec<QueuedJob> {
        let drained = {
            let mut state = self.lock();
            state.shutting_down = true;
            for handle in state.running.values() {
                handle.request_abort();
            }
            state.queue.drain()
        };
        self.wakeup.notify_one();
        drained.into_iter().map(|(_, q)| q).collect()
    }
}

/// Owns the dispatcher task and the shared queue.
pub struct TransferScheduler {
    shared: Arc<SchedulerShared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    max_concurrent: usize,
}

impl TransferScheduler {
    /// Start a scheduler with `max_concurrent` worker slots. Must be called
    /// from within a Tokio runtime.
    pub fn new(max_concurrent: usize, progress_step: f64) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let shared = Arc::new(SchedulerShared {
            state: Mutex::new(SchedulerState {
                queue: JobQueue::new(),
                running: HashMap::new(),
                shutting_down: false,
            }),
            wakeup: Notify::new(),
            next_id: AtomicU64::new(0),
            progress_step,
        });
        let dispatcher = tokio::spawn(dispatch::run_dispatcher(
            Arc::clone(&shared),
            max_concurrent,
        ));
        Self {
            shared,
            dispatcher: Mutex::new(Some(dispatcher)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn running(&self) -> usize {
        self.shared.lock().running.len()
    }

    /// Queue `work`. It runs on a worker slot with a [`TransferIo`] whose abort
    /// token is set by [`TransferHandle::cancel`]. Returning
    /// `Err(AssetError::Cancelled)` resolves the transfer as `Cancelled`.
    pub fn submit<T, F, Fut>(
        &self,
        direction: Direction,
        asset_id: Option<AssetId>,
        priority: Priority,
        work: F,
    ) -> Result<Transfer<T>>
    where
        T: Send + 'static,
        F: FnOnce(TransferIo) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let id = self.shared.allocate_id();
        let handle = Arc::new(HandleShared::new(
            id,
            direction,
            asset_id,
            priority,
            TransferState::Queued,
        ));
        let (progress_tx, progress_rx) = watch::channel(TransferProgress::default());
        let (done_tx, done_rx) = oneshot::channel();
        let queued = QueuedJob {
            handle: Arc::clone(&handle),
            progress: progress_tx,
            job: Box::new(TypedJob {
                handle: Arc::clone(&handle),
                work,
                done: done_tx,
            }),
        };

        {
            let mut state = self.shared.lock();
            if state.shutting_down {
                return Err(AssetError::PreconditionFailed(
                    "transfer scheduler is shut down".into(),
                ));
            }
            state.queue.push(id, priority, queued);
        }
        self.shared.wakeup.notify_one();
        tracing::debug!(transfer = %id, ?direction, ?priority, "transfer queued");

        Ok(Transfer::new(
            TransferHandle {
                shared: handle,
                scheduler: Arc::downgrade(&self.shared),
            },
            progress_rx,
            done_rx,
        ))
    }

    /// A transfer that resolved without touching a worker slot.
    pub(crate) fn completed<T>(
        &self,
        direction: Direction,
        asset_id: Option<AssetId>,
        value: T,
    ) -> Transfer<T> {
        let handle = Arc::new(HandleShared::new(
            self.shared.allocate_id(),
            direction,
            asset_id,
            Priority::Normal,
            TransferState::Completed,
        ));
        Transfer::ready(
            TransferHandle {
                shared: handle,
                scheduler: Arc::downgrade(&self.shared),
            },
            value,
        )
    }

    /// Cancel everything queued, ask running jobs to abort, and wait for the
    /// dispatcher to drain.
    pub async fn shutdown(&self) {
        for queued in self.shared.begin_shutdown() {
            queued.job.cancel();
        }
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dispatcher) = dispatcher {
            if let Err(e) = dispatcher.await {
                tracing::warn!(error = %e, "transfer dispatcher join failed");
            }
        }
    }
}

impl Drop for TransferScheduler {
    fn drop(&mut self) {
        for queued in self.shared.begin_shutdown() {
            queued.job.cancel();
        }
    }
}
