//! Progress reporting for transfers (bytes done, fraction, rate, ETA).
//!
//! Each job gets a [`ProgressReporter`] feeding a `watch` channel; callers read
//! the latest [`TransferProgress`] from [`crate::transfer::Transfer::progress`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;

/// Snapshot of progress for one transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferProgress {
    /// Bytes moved so far.
    pub bytes_done: u64,
    /// Expected total in bytes (0 if unknown).
    pub total_bytes: u64,
    /// Elapsed time since the job started running (seconds).
    pub elapsed_secs: f64,
}

impl TransferProgress {
    /// Transfer rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if rate is 0 or total unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0]. Unknown totals report 0.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }
}

struct ReporterState {
    last_sent: f64,
    started: Instant,
}

/// Publishes a monotonically non-decreasing fraction, throttled to `step`.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<TransferProgress>>,
    state: Arc<Mutex<ReporterState>>,
    step: f64,
}

impl ProgressReporter {
    pub fn new(tx: watch::Sender<TransferProgress>, step: f64) -> Self {
        Self {
            tx: Arc::new(tx),
            state: Arc::new(Mutex::new(ReporterState {
                last_sent: 0.0,
                started: Instant::now(),
            })),
            step: step.clamp(0.0, 1.0),
        }
    }

    /// Reporter whose updates go nowhere.
    pub fn detached() -> Self {
        let (tx, _rx) = watch::channel(TransferProgress::default());
        Self::new(tx, 1.0)
    }

    /// Record `bytes_done` of `total_bytes`. Sent only if the fraction moved
    /// forward by at least `step`, or reached 1.0 for the first time.
    pub fn report(&self, bytes_done: u64, total_bytes: u64) {
        if total_bytes == 0 {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let stats = TransferProgress {
            bytes_done: bytes_done.min(total_bytes),
            total_bytes,
            elapsed_secs: state.started.elapsed().as_secs_f64(),
        };
        let fraction = stats.fraction();
        let finished = fraction >= 1.0 && state.last_sent < 1.0;
        if fraction <= state.last_sent || (fraction - state.last_sent < self.step && !finished) {
            return;
        }
        state.last_sent = fraction;
        self.tx.send_replace(stats);
    }

    /// Last fraction published.
    pub fn fraction(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_sent
    }
}
