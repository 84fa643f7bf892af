//! Asset lifecycle: create, refresh, delete.

use std::path::Path;
use std::sync::Arc;

use crate::checksum;
use crate::error::{AssetError, Result};
use crate::model::{AssetId, AssetRef, DataSource, Destination, MetadataPolicy, RenditionKind};
use crate::transfer::{Direction, Priority, Transfer, TransferIo};
use crate::transport::{CreateAsset, GenerateRenditions};

use super::uploads::{validate_source, PendingUpload};
use super::{blocking, AssetClient, Shared};

/// The only content type accepted for new assets.
pub const CREATE_CONTENT_TYPE: &str = "image/jpeg";

impl AssetClient {
    /// Upload `local_path` as a new asset named `name` into `destination`.
    ///
    /// The returned asset carries the auto renditions (2048, 1280,
    /// thumbnail2x); any the service did not produce on its own are generated
    /// before the transfer completes. The asset is recorded locally as soon
    /// as the service accepts it, so if that generation fails the transfer
    /// fails but the asset is still listed under `destination`.
    pub fn create(
        &self,
        name: &str,
        destination: &Destination,
        local_path: &Path,
        content_type: &str,
    ) -> Result<Transfer<AssetRef>> {
        if name.trim().is_empty() {
            return Err(AssetError::InvalidArgument("asset name is empty".into()));
        }
        let content_type = content_type.trim();
        if content_type.is_empty() {
            return Err(AssetError::InvalidArgument("content type is empty".into()));
        }
        if !content_type.eq_ignore_ascii_case(CREATE_CONTENT_TYPE) {
            return Err(AssetError::InvalidArgument(format!(
                "unsupported content type {content_type:?}; new assets must be {CREATE_CONTENT_TYPE}"
            )));
        }
        let pending = validate_source(local_path, CREATE_CONTENT_TYPE)?;

        let shared = Arc::clone(&self.shared);
        let name = name.to_string();
        let destination = destination.clone();
        self.scheduler.submit(Direction::Upload, None, Priority::Normal, move |io| {
            run_create(shared, name, destination, pending, io)
        })
    }

    /// Fetch the latest state of `id` from the service.
    ///
    /// A 404 fails with `NotFound` and leaves the local snapshot in place.
    pub fn refresh(&self, id: &AssetId) -> Result<Transfer<AssetRef>> {
        let shared = Arc::clone(&self.shared);
        let id = id.clone();
        self.scheduler.submit(
            Direction::Metadata,
            Some(id.clone()),
            Priority::Normal,
            move |io| run_refresh(shared, id, io),
        )
    }

    /// Delete `id` remotely, then drop it from the table, destination lists and cache.
    pub fn delete(&self, id: &AssetId) -> Result<Transfer<()>> {
        let shared = Arc::clone(&self.shared);
        let id = id.clone();
        self.scheduler.submit(
            Direction::Metadata,
            Some(id.clone()),
            Priority::Normal,
            move |io| run_delete(shared, id, io),
        )
    }
}

async fn run_create(
    shared: Arc<Shared>,
    name: String,
    destination: Destination,
    pending: PendingUpload,
    io: TransferIo,
) -> Result<AssetRef> {
    // Once the asset exists remotely, generation runs to completion even if cancelled.
    let generate_io = io.uncancellable();
    let transport = Arc::clone(&shared.transport);
    let dest = destination.clone();
    let mut asset = blocking(move || {
        let source = pending.hash(&io)?;
        let record = transport.create_asset(
            &CreateAsset {
                name,
                destination: dest,
                source: source.clone(),
            },
            &io,
        )?;
        checksum::check_echoed(&source.sha256, record.sha256.as_deref(), "create");
        Ok(record.asset)
    })
    .await?;
    asset.master_data_exists = true;

    // Record the asset before anything else can fail, so a failed follow-up
    // still leaves it discoverable through its destination.
    {
        let mut state = shared.state();
        state.commit_asset(asset.clone());
        state.register(&destination, &asset.id);
    }
    tracing::info!(asset = %asset.id, name = %asset.name, %destination, "asset created");

    let missing: Vec<RenditionKind> = RenditionKind::AUTO
        .into_iter()
        .filter(|kind| !asset.has_data(DataSource::Rendition(*kind)))
        .collect();
    if missing.is_empty() {
        return Ok(asset);
    }

    let policy = MetadataPolicy::for_kinds(&missing);
    tracing::debug!(asset = %asset.id, ?missing, "generating missing auto renditions");
    let transport = Arc::clone(&shared.transport);
    let asset_id = asset.id.clone();
    let request = GenerateRenditions {
        kinds: missing,
        metadata: policy,
    };
    let generated =
        blocking(move || transport.generate_renditions(&asset_id, &request, &generate_io)).await;
    let mut descriptors = match generated {
        Ok(descriptors) => descriptors,
        Err(e) => {
            tracing::warn!(asset = %asset.id, error = %e, "asset created but auto renditions failed");
            return Err(e);
        }
    };
    for d in &mut descriptors {
        d.metadata = policy;
    }

    let mut state = shared.state();
    if let Some(current) = state.asset_mut(&asset.id) {
        current.merge_renditions(descriptors.iter().cloned());
    }
    asset.merge_renditions(descriptors);
    Ok(asset)
}

async fn run_refresh(shared: Arc<Shared>, id: AssetId, io: TransferIo) -> Result<AssetRef> {
    let transport = Arc::clone(&shared.transport);
    let fetch_id = id.clone();
    let asset = blocking(move || transport.fetch_asset(&fetch_id, &io)).await?;
    if asset.id != id {
        return Err(AssetError::Decode(format!(
            "requested asset {id}, service returned {}",
            asset.id
        )));
    }
    shared.state().commit_asset(asset.clone());
    Ok(asset)
}

async fn run_delete(shared: Arc<Shared>, id: AssetId, io: TransferIo) -> Result<()> {
    let transport = Arc::clone(&shared.transport);
    let delete_id = id.clone();
    blocking(move || transport.delete_asset(&delete_id, &io)).await?;
    shared.state().remove_asset(&id);
    tracing::info!(asset = %id, "asset deleted");
    Ok(())
}
