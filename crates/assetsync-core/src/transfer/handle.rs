//! Caller-side handle for one queued or running transfer.
//!
//! The scheduler owns execution. A handle only holds a weak reference back to
//! it, so priority changes and cancellation requests become no-ops once the
//! scheduler is gone.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::error::AssetError;
use crate::model::AssetId;
use crate::scheduler::SchedulerShared;

/// Scheduler-assigned transfer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(pub u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
    /// JSON-only calls: refresh, delete, rendition generation.
    Metadata,
}

/// Queue priority. Higher tiers jump ahead of queued lower tiers but never
/// preempt a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(AssetError::Decode(format!("unknown priority: {other:?}"))),
        }
    }
}

/// Lifecycle: `Queued → Running → {Completed | Cancelled | Failed}`.
/// A queued job may also go straight to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Cancelled | TransferState::Failed
        )
    }
}

/// State shared between the scheduler and every clone of a handle.
pub(crate) struct HandleShared {
    pub(crate) id: TransferId,
    pub(crate) direction: Direction,
    pub(crate) asset_id: Option<AssetId>,
    priority: Mutex<Priority>,
    state: Mutex<TransferState>,
    abort: Arc<AtomicBool>,
}

impl HandleShared {
    pub(crate) fn new(
        id: TransferId,
        direction: Direction,
        asset_id: Option<AssetId>,
        priority: Priority,
        state: TransferState,
    ) -> Self {
        Self {
            id,
            direction,
            asset_id,
            priority: Mutex::new(priority),
            state: Mutex::new(state),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn priority(&self) -> Priority {
        *self.priority.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_priority(&self, priority: Priority) {
        *self.priority.lock().unwrap_or_else(PoisonError::into_inner) = priority;
    }

    pub(crate) fn state(&self) -> TransferState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: TransferState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Token the running job polls at each I/O checkpoint.
    pub(crate) fn abort_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub(crate) fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }
}

/// What a cancellation request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStatus {
    /// Removed from the queue before it ran; resolves `Cancelled`.
    Dequeued,
    /// Running; it will stop at its next checkpoint unless already past the last one.
    AbortRequested,
    /// Already finished (or the scheduler is gone); nothing to do.
    Finished,
}

/// Cancellable, priority-adjustable reference to a transfer.
#[derive(Clone)]
pub struct TransferHandle {
    pub(crate) shared: Arc<HandleShared>,
    pub(crate) scheduler: Weak<SchedulerShared>,
}

impl TransferHandle {
    pub fn id(&self) -> TransferId {
        self.shared.id
    }

    pub fn direction(&self) -> Direction {
        self.shared.direction
    }

    /// Target asset. `None` for a create whose id is not assigned yet.
    pub fn asset_id(&self) -> Option<&AssetId> {
        self.shared.asset_id.as_ref()
    }

    pub fn priority(&self) -> Priority {
        self.shared.priority()
    }

    pub fn state(&self) -> TransferState {
        self.shared.state()
    }

    /// Change priority while queued. Returns false (and changes nothing) once
    /// the job is running or finished.
    pub fn set_priority(&self, priority: Priority) -> bool {
        match self.scheduler.upgrade() {
            Some(scheduler) => scheduler.reprioritize(self.shared.id, priority),
            None => false,
        }
    }

    /// Request cancellation. Non-blocking.
    pub fn cancel(&self) -> CancelStatus {
        match self.scheduler.upgrade() {
            Some(scheduler) => scheduler.cancel(self.shared.id),
            None => CancelStatus::Finished,
        }
    }
}

impl fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferHandle")
            .field("id", &self.shared.id)
            .field("direction", &self.shared.direction)
            .field("asset_id", &self.shared.asset_id)
            .field("priority", &self.priority())
            .field("state", &self.state())
            .finish()
    }
}
