//! Master and rendition uploads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checksum;
use crate::error::{AssetError, Result};
use crate::model::{AssetId, AssetRef, MetadataPolicy, RenditionDescriptor, RenditionKind};
use crate::storage::regular_file_len;
use crate::transfer::{Direction, Priority, Transfer, TransferIo};
use crate::transport::UploadSource;

use super::renditions::submit_generate;
use super::{blocking, AssetClient, MasterUpload, Shared};

/// Content type for an upload source: JPEG by extension, otherwise raw bytes
/// (camera raw and other master formats).
pub fn infer_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// A validated local file whose digest is not computed yet.
#[derive(Debug, Clone)]
pub(crate) struct PendingUpload {
    path: PathBuf,
    content_type: String,
    size: u64,
}

impl PendingUpload {
    /// Hash the file (on a blocking worker) into an [`UploadSource`].
    pub(crate) fn hash(self, io: &TransferIo) -> Result<UploadSource> {
        io.checkpoint()?;
        let sha256 = checksum::sha256_path(&self.path)?;
        io.checkpoint()?;
        Ok(UploadSource {
            path: self.path,
            content_type: self.content_type,
            size: self.size,
            sha256,
        })
    }
}

pub(crate) fn validate_source(path: &Path, content_type: &str) -> Result<PendingUpload> {
    let size = regular_file_len(path).ok_or_else(|| {
        AssetError::InvalidArgument(format!("{} is not an existing regular file", path.display()))
    })?;
    Ok(PendingUpload {
        path: path.to_path_buf(),
        content_type: content_type.to_string(),
        size,
    })
}

impl AssetClient {
    /// Upload new master bytes for `id`.
    ///
    /// Files above the configured cap fail with `PayloadTooLarge` before any
    /// network call. With `auto_generate`, generation of the auto renditions
    /// is queued once the upload succeeds.
    pub fn upload_master_data(
        &self,
        id: &AssetId,
        local_path: &Path,
        priority: Priority,
        auto_generate: bool,
    ) -> Result<Transfer<MasterUpload>> {
        let pending = validate_source(local_path, infer_content_type(local_path))?;
        let limit = self.shared.max_master_upload_bytes;
        if pending.size > limit {
            return Err(AssetError::PayloadTooLarge(format!(
                "{} is {} bytes, master uploads are limited to {limit} bytes",
                local_path.display(),
                pending.size
            )));
        }

        let shared = Arc::clone(&self.shared);
        let scheduler = Arc::downgrade(&self.scheduler);
        let id = id.clone();
        self.scheduler.submit(
            Direction::Upload,
            Some(id.clone()),
            priority,
            move |io| async move {
                let asset = run_upload_master(Arc::clone(&shared), id, pending, io).await?;
                let renditions = if auto_generate {
                    let kinds = RenditionKind::AUTO.to_vec();
                    let policy = MetadataPolicy::for_kinds(&kinds);
                    match scheduler.upgrade() {
                        Some(scheduler) => {
                            match submit_generate(&scheduler, shared, &asset.id, kinds, policy, priority) {
                                Ok(transfer) => Some(transfer),
                                Err(e) => {
                                    tracing::warn!(asset = %asset.id, error = %e, "could not queue rendition generation");
                                    None
                                }
                            }
                        }
                        None => None,
                    }
                } else {
                    None
                };
                Ok::<_, AssetError>(MasterUpload { asset, renditions })
            },
        )
    }

    /// Upload bytes for one rendition of `id`. The rendition's cache entry is dropped.
    pub fn upload_rendition(
        &self,
        id: &AssetId,
        descriptor: &RenditionDescriptor,
        local_path: &Path,
        priority: Priority,
    ) -> Result<Transfer<AssetRef>> {
        let pending = validate_source(local_path, infer_content_type(local_path))?;
        let shared = Arc::clone(&self.shared);
        let id = id.clone();
        let descriptor = descriptor.clone();
        self.scheduler.submit(
            Direction::Upload,
            Some(id.clone()),
            priority,
            move |io| run_upload_rendition(shared, id, descriptor, pending, io),
        )
    }
}

async fn run_upload_master(
    shared: Arc<Shared>,
    id: AssetId,
    pending: PendingUpload,
    io: TransferIo,
) -> Result<AssetRef> {
    let transport = Arc::clone(&shared.transport);
    let upload_id = id.clone();
    let record = blocking(move || {
        let source = pending.hash(&io)?;
        let record = transport.upload_master(&upload_id, &source, &io)?;
        checksum::check_echoed(&source.sha256, record.sha256.as_deref(), "master upload");
        Ok(record)
    })
    .await?;

    let mut asset = record.asset;
    asset.master_data_exists = true;
    let mut state = shared.state();
    state.commit_asset(asset.clone());
    state.cache.invalidate(&id);
    tracing::info!(asset = %id, size = asset.size, "master data uploaded");
    Ok(asset)
}

async fn run_upload_rendition(
    shared: Arc<Shared>,
    id: AssetId,
    descriptor: RenditionDescriptor,
    pending: PendingUpload,
    io: TransferIo,
) -> Result<AssetRef> {
    let transport = Arc::clone(&shared.transport);
    let upload_id = id.clone();
    let sent = descriptor.clone();
    let size = pending.size;
    let record = blocking(move || {
        let source = pending.hash(&io)?;
        let record = transport.upload_rendition(&upload_id, &sent, &source, &io)?;
        checksum::check_echoed(&source.sha256, record.sha256.as_deref(), "rendition upload");
        Ok(record)
    })
    .await?;

    let mut asset = record.asset;
    asset.renditions.entry(descriptor.kind).or_insert_with(|| RenditionDescriptor {
        size,
        available: true,
        ..descriptor.clone()
    });
    let mut state = shared.state();
    state.commit_asset(asset.clone());
    state.cache.remove(&id, descriptor.kind);
    tracing::info!(asset = %id, kind = %descriptor.kind, "rendition uploaded");
    Ok(asset)
}
