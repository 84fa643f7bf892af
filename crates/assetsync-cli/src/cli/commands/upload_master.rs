//! `assetsync upload-master <id> <path>` – replace an asset's master bytes.

use anyhow::Result;
use assetsync_core::model::AssetId;
use assetsync_core::transfer::Priority;
use std::path::Path;

use super::session::{print_asset, Session};

pub async fn run_upload_master(
    session: &Session,
    id: &AssetId,
    path: &Path,
    generate: bool,
    priority: Priority,
) -> Result<()> {
    let upload = session
        .run("upload master", |c| c.upload_master_data(id, path, priority, generate))
        .await?;
    if let Some(renditions) = upload.renditions {
        let descriptors = renditions.await.into_result()?;
        for d in &descriptors {
            eprintln!("Generated {} ({} bytes)", d.kind, d.size);
        }
    }
    print_asset(&upload.asset)
}
