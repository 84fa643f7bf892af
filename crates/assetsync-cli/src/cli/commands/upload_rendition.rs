//! `assetsync upload-rendition <id> <kind> <path>` – upload one rendition.

use anyhow::Result;
use assetsync_core::model::{AssetId, RenditionDescriptor, RenditionKind};
use assetsync_core::transfer::Priority;
use std::path::Path;

use super::session::{print_asset, Session};

pub async fn run_upload_rendition(
    session: &Session,
    id: &AssetId,
    kind: RenditionKind,
    path: &Path,
    priority: Priority,
) -> Result<()> {
    let current = session.fetch(id).await?;
    let descriptor = current
        .rendition(kind)
        .cloned()
        .unwrap_or_else(|| RenditionDescriptor::new(kind));
    let asset = session
        .run("upload rendition", |c| c.upload_rendition(id, &descriptor, path, priority))
        .await?;
    print_asset(&asset)
}
