//! Per-job I/O context: abort token plus progress reporter.
//!
//! Transports receive a `&TransferIo` and call [`TransferIo::checkpoint`]
//! between I/O steps; a set token turns into [`AssetError::Cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AssetError, Result};

use super::progress::ProgressReporter;

#[derive(Clone)]
pub struct TransferIo {
    abort: Arc<AtomicBool>,
    progress: ProgressReporter,
}

impl TransferIo {
    pub fn new(abort: Arc<AtomicBool>, progress: ProgressReporter) -> Self {
        Self { abort, progress }
    }

    /// Context with a private abort token and no progress listener.
    pub fn detached() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), ProgressReporter::detached())
    }

    /// Same progress reporter, fresh abort token. Used for work that must run
    /// to completion once a job is past its last checkpoint.
    pub fn uncancellable(&self) -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), self.progress.clone())
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    pub fn checkpoint(&self) -> Result<()> {
        if self.is_aborted() {
            return Err(AssetError::Cancelled);
        }
        Ok(())
    }

    pub fn report(&self, bytes_done: u64, total_bytes: u64) {
        self.progress.report(bytes_done, total_bytes);
    }
}
