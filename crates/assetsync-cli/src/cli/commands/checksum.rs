//! `assetsync checksum <path>` – SHA-256 of a file, as sent with uploads.

use anyhow::Result;
use assetsync_core::checksum;
use std::path::Path;

/// Compute and print SHA-256 of the given file.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::sha256_path(path)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
