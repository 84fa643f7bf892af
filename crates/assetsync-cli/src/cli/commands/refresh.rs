//! `assetsync refresh <id>` – print the latest state of an asset.

use anyhow::Result;
use assetsync_core::model::AssetId;

use super::session::{print_asset, Session};

pub async fn run_refresh(session: &Session, id: &AssetId) -> Result<()> {
    let asset = session.fetch(id).await?;
    print_asset(&asset)
}
