//! Error kinds surfaced by the client, scheduler and transports.
//!
//! Validation errors are returned synchronously from client calls; everything
//! else arrives exactly once through a transfer's outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    /// Bad local input, caught before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs a server-side resource that is not known to exist.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The server reports the resource as missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport failure. Eligible for caller-directed retry.
    #[error("network error: {0}")]
    Network(String),

    #[error("transfer cancelled")]
    Cancelled,

    #[error("server returned HTTP {status}: {message}")]
    Server { status: u32, message: String },

    /// Unknown enum string or malformed payload.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AssetError::Cancelled)
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(e: serde_json::Error) -> Self {
        AssetError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AssetError>;
