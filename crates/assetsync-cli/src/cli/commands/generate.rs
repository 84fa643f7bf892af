//! `assetsync generate <id> <kind>...` – request rendition generation.

use anyhow::Result;
use assetsync_core::model::{AssetId, MetadataPolicy, RenditionKind};
use assetsync_core::transfer::Priority;

use super::session::Session;

pub async fn run_generate(
    session: &Session,
    id: &AssetId,
    kinds: &[RenditionKind],
    metadata: &[String],
    priority: Priority,
) -> Result<()> {
    let descriptors = if metadata.is_empty() {
        session
            .run_once("generate", |c| c.generate_renditions(id, kinds, priority))
            .await?
    } else {
        let policy = MetadataPolicy::from_directives(metadata)?;
        session
            .run_once("generate", |c| {
                c.generate_renditions_with_policy(id, kinds, policy, priority)
            })
            .await?
    };

    println!("{:<12} {:<10} {:<10} {}", "KIND", "SIZE", "AVAILABLE", "METADATA");
    for d in descriptors {
        println!(
            "{:<12} {:<10} {:<10} {}",
            d.kind.as_str(),
            d.size,
            d.available,
            d.metadata.directives().join(",")
        );
    }
    Ok(())
}
