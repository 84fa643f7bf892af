//! Wire details of the REST schema: status mapping, error bodies, headers.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

use crate::error::AssetError;
use crate::model::{Destination, RenditionDescriptor};

const MAX_ERROR_BODY: usize = 512;

/// `metadata` part of a create request.
#[derive(Debug, Serialize)]
pub(crate) struct CreateMetadata<'a> {
    pub name: &'a str,
    pub content_type: &'a str,
    pub destination: &'a Destination,
    pub sha256: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    pub renditions: Vec<RenditionDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

pub(crate) fn is_success(status: u32) -> bool {
    (200..300).contains(&status)
}

/// Map a non-2xx response onto the client's error kinds. `what` names the
/// request for the message (e.g. `GET asset a1`).
pub fn status_error(status: u32, body: &[u8], what: &str) -> AssetError {
    let detail = error_detail(body);
    let message = if detail.is_empty() {
        what.to_string()
    } else {
        format!("{what}: {detail}")
    };
    match status {
        404 | 410 => AssetError::NotFound(message),
        412 => AssetError::PreconditionFailed(message),
        413 => AssetError::PayloadTooLarge(message),
        _ => AssetError::Server { status, message },
    }
}

fn error_detail(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.error;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    let mut end = text.len().min(MAX_ERROR_BODY);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Status and headers of the final response, fed line by line from curl's
/// header callback. A new status line (redirect, `100 Continue`) starts over.
#[derive(Debug, Default)]
pub(crate) struct HeaderCapture {
    status: Cell<Option<u32>>,
    etag: RefCell<Option<String>>,
}

impl HeaderCapture {
    pub fn feed(&self, data: &[u8]) {
        let Ok(line) = std::str::from_utf8(data) else {
            return;
        };
        let line = line.trim();
        if line.starts_with("HTTP/") {
            let code = line
                .split_whitespace()
                .nth(1)
                .and_then(|c| c.parse::<u32>().ok());
            self.status.set(code);
            self.etag.replace(None);
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("etag") {
                let value = value.trim();
                let value = value.strip_prefix("W/").unwrap_or(value);
                self.etag.replace(Some(value.trim_matches('"').to_string()));
            }
        }
    }

    pub fn status(&self) -> Option<u32> {
        self.status.get()
    }

    pub fn is_success(&self) -> bool {
        self.status().is_some_and(is_success)
    }

    pub fn etag(&self) -> Option<String> {
        self.etag.borrow().clone()
    }
}
