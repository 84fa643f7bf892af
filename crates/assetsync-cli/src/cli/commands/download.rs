//! `assetsync download <id> <source> [-o path]` – fetch master, proxy or rendition bytes.

use anyhow::Result;
use assetsync_core::model::{AssetId, DataSource};
use assetsync_core::transfer::Priority;
use std::path::Path;

use super::session::Session;

pub async fn run_download(
    session: &Session,
    id: &AssetId,
    source: DataSource,
    output: Option<&Path>,
    priority: Priority,
) -> Result<()> {
    if matches!(source, DataSource::Master | DataSource::Proxy) {
        // Master and proxy downloads check the local snapshot first.
        session.fetch(id).await?;
    }

    let label = format!("download {source}");
    match (source, output) {
        (DataSource::Master, Some(dest)) => {
            let n = session
                .run(&label, |c| c.download_master_data_to_file(id, dest, priority))
                .await?;
            println!("Saved {n} bytes of {source} to {}", dest.display());
        }
        (DataSource::Proxy, Some(dest)) => {
            let n = session
                .run(&label, |c| c.download_proxy_data_to_file(id, dest, priority))
                .await?;
            println!("Saved {n} bytes of {source} to {}", dest.display());
        }
        (DataSource::Rendition(kind), Some(dest)) => {
            let n = session
                .run(&label, |c| c.download_rendition_to_file(id, kind, dest, priority))
                .await?;
            println!("Saved {n} bytes of {source} to {}", dest.display());
        }
        (DataSource::Master, None) => {
            let bytes = session
                .run(&label, |c| c.download_master_data(id, priority))
                .await?;
            println!("{} bytes of {source}", bytes.len());
        }
        (DataSource::Proxy, None) => {
            let bytes = session
                .run(&label, |c| c.download_proxy_data(id, priority))
                .await?;
            println!("{} bytes of {source}", bytes.len());
        }
        (DataSource::Rendition(kind), None) => {
            let data = session
                .run(&label, |c| c.download_rendition(id, kind, priority))
                .await?;
            println!(
                "{} bytes of {source} (revision {}{})",
                data.bytes.len(),
                data.revision.as_deref().unwrap_or("-"),
                if data.from_cache { ", from cache" } else { "" }
            );
        }
    }
    Ok(())
}
