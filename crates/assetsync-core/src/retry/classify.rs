//! Map client errors onto retry kinds.

use crate::error::AssetError;

use super::policy::ErrorKind;

pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Only transport failures and server-side errors are worth retrying;
/// validation, missing resources and cancellation are final.
pub fn classify(e: &AssetError) -> ErrorKind {
    match e {
        AssetError::Network(_) => ErrorKind::Connection,
        AssetError::Server { status, .. } => classify_http_status(*status),
        _ => ErrorKind::Other,
    }
}
