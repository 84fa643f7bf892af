//! On-disk layout of cached renditions: `<cache_dir>/<asset dir>/<kind>`.
//!
//! The asset directory is a readable prefix of the id followed by the SHA-256
//! of the full id, so distinct ids never share a directory.

use std::path::{Path, PathBuf};

use crate::checksum::sha256_bytes;
use crate::model::{AssetId, RenditionKind};

/// Bytes of the sanitized id kept in front of the digest.
const PREFIX_MAX: usize = 64;

/// Location for a cached rendition.
pub fn entry_path(cache_dir: &Path, id: &AssetId, kind: RenditionKind) -> PathBuf {
    cache_dir.join(asset_dir(id)).join(kind.as_str())
}

fn asset_dir(id: &AssetId) -> String {
    let digest = sha256_bytes(id.as_str().as_bytes());
    let prefix = sanitize_component(id.as_str(), PREFIX_MAX);
    if prefix.is_empty() {
        digest
    } else {
        format!("{prefix}-{digest}")
    }
}

/// Make `name` safe as a single Linux path component of at most `max` bytes.
///
/// - Replaces NUL, `/`, `\`, whitespace and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots and underscores (no `..` traversal)
fn sanitize_component(name: &str, max: usize) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;
    for c in name.chars() {
        let c = if c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(max);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
