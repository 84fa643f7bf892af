//! Dispatcher loop: keep up to `max_concurrent` jobs in flight.
//!
//! When a job finishes (or new work is queued) the next queued job is started,
//! until the scheduler shuts down and the last running job has drained.

use std::sync::Arc;
use tokio::task::JoinSet;

use crate::transfer::{HandleShared, ProgressReporter, TransferIo, TransferState};

use super::SchedulerShared;

/// Clears the running-set entry when a job task ends, including by panic.
struct RunningGuard {
    shared: Arc<SchedulerShared>,
    handle: Arc<HandleShared>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if !self.handle.state().is_terminal() {
            self.handle.set_state(TransferState::Failed);
        }
        self.shared.finish_running(self.handle.id);
    }
}

pub(super) async fn run_dispatcher(shared: Arc<SchedulerShared>, max_concurrent: usize) {
    let max_concurrent = max_concurrent.max(1);
    let mut join_set = JoinSet::new();

    loop {
        while join_set.len() < max_concurrent {
            let Some(queued) = shared.claim_next() else {
                break;
            };
            let io = TransferIo::new(
                queued.handle.abort_token(),
                ProgressReporter::new(queued.progress, shared.progress_step),
            );
            tracing::debug!(
                transfer = %queued.handle.id,
                direction = ?queued.handle.direction,
                priority = ?queued.handle.priority(),
                "transfer started"
            );
            let guard = RunningGuard {
                shared: Arc::clone(&shared),
                handle: queued.handle,
            };
            let job = queued.job;
            join_set.spawn(async move {
                let _guard = guard;
                job.run(io).await;
            });
        }

        if join_set.is_empty() {
            if shared.is_shutting_down() {
                break;
            }
            shared.wakeup.notified().await;
            continue;
        }

        tokio::select! {
            joined = join_set.join_next() => {
                if let Some(Err(e)) = joined {
                    tracing::warn!(error = %e, "transfer task did not complete");
                }
            }
            _ = shared.wakeup.notified() => {}
        }
    }

    tracing::debug!("transfer dispatcher stopped");
}
