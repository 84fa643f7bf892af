//! SHA-256 digests of upload sources and cache directory names.
//!
//! Computed on the blocking worker right before an upload; the digest travels
//! with the request and is compared to what the service echoes back.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// SHA-256 of a file as lowercase hex. Reads in fixed-size chunks.
pub fn sha256_path(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Log a warning if the service reported a digest different from ours.
/// Returns false on mismatch; a missing remote digest counts as a match.
pub fn check_echoed(local: &str, remote: Option<&str>, what: &str) -> bool {
    match remote {
        Some(remote) if !remote.eq_ignore_ascii_case(local) => {
            tracing::warn!(
                local = %local,
                remote = %remote,
                "{what}: server checksum differs from uploaded file"
            );
            false
        }
        _ => true,
    }
}
