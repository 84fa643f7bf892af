//! `assetsync create <path> --collection <id>` – create an asset from a JPEG.

use anyhow::{anyhow, Result};
use assetsync_core::client::infer_content_type;
use assetsync_core::model::Destination;
use std::path::Path;

use super::session::{print_asset, Session};

pub async fn run_create(
    session: &Session,
    path: &Path,
    destination: &Destination,
    name: Option<&str>,
    content_type: Option<&str>,
) -> Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("cannot derive an asset name from {}", path.display()))?,
    };
    let content_type = content_type.unwrap_or_else(|| infer_content_type(path));
    let asset = session
        .run_once("create", |c| c.create(&name, destination, path, content_type))
        .await?;
    eprintln!("Created asset {} in {}", asset.id, destination);
    print_asset(&asset)
}
