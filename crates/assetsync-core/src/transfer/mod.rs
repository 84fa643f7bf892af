//! Transfer handles, progress, per-job I/O context and outcomes.

mod handle;
mod io;
mod outcome;
mod progress;

pub(crate) use handle::HandleShared;
pub use handle::{CancelStatus, Direction, Priority, TransferHandle, TransferId, TransferState};
pub use io::TransferIo;
pub use outcome::{Transfer, TransferOutcome};
pub use progress::{ProgressReporter, TransferProgress};
