//! Caller-side retry and backoff.
//!
//! The client never retries on its own. This module classifies
//! [`AssetError`](crate::AssetError)s (throttling, connection failures, 5xx)
//! and computes exponential backoff so callers such as the CLI can re-submit
//! failed requests consistently.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
