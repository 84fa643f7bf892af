//! `assetsync delete <id>` – delete an asset.

use anyhow::Result;
use assetsync_core::model::AssetId;

use super::session::Session;

pub async fn run_delete(session: &Session, id: &AssetId) -> Result<()> {
    session.run_once("delete", |c| c.delete(id)).await?;
    println!("Deleted asset {id}");
    Ok(())
}
