//! Master, proxy and rendition downloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::entry_path;
use crate::error::{AssetError, Result};
use crate::model::{AssetId, DataSource, RenditionKind};
use crate::storage::{PartFile, StagedFile};
use crate::transfer::{Direction, Priority, Transfer, TransferIo};

use super::{blocking, AssetClient, RenditionData, Shared};

impl AssetClient {
    /// Download master bytes into memory.
    pub fn download_master_data(&self, id: &AssetId, priority: Priority) -> Result<Transfer<Vec<u8>>> {
        self.download_data(id, DataSource::Master, priority)
    }

    /// Stream master bytes to `dest` (via `dest.part`). Resolves to the byte count.
    pub fn download_master_data_to_file(
        &self,
        id: &AssetId,
        dest: &Path,
        priority: Priority,
    ) -> Result<Transfer<u64>> {
        self.download_data_to_file(id, DataSource::Master, dest, priority)
    }

    pub fn download_proxy_data(&self, id: &AssetId, priority: Priority) -> Result<Transfer<Vec<u8>>> {
        self.download_data(id, DataSource::Proxy, priority)
    }

    pub fn download_proxy_data_to_file(
        &self,
        id: &AssetId,
        dest: &Path,
        priority: Priority,
    ) -> Result<Transfer<u64>> {
        self.download_data_to_file(id, DataSource::Proxy, dest, priority)
    }

    /// Rendition bytes, served from the cache when a fresh entry is resident.
    /// Network results are written to the cache directory and recorded with
    /// the revision tag the service reported.
    pub fn download_rendition(
        &self,
        id: &AssetId,
        kind: RenditionKind,
        priority: Priority,
    ) -> Result<Transfer<RenditionData>> {
        self.check_not_inert(id)?;
        if let Some(hit) = self.cached_rendition(id, kind) {
            return Ok(self.scheduler.completed(Direction::Download, Some(id.clone()), hit));
        }
        let shared = Arc::clone(&self.shared);
        let id = id.clone();
        self.scheduler.submit(
            Direction::Download,
            Some(id.clone()),
            priority,
            move |io| run_rendition_download(shared, id, kind, io),
        )
    }

    /// Stream a rendition to `dest`. Never reads or populates the cache.
    pub fn download_rendition_to_file(
        &self,
        id: &AssetId,
        kind: RenditionKind,
        dest: &Path,
        priority: Priority,
    ) -> Result<Transfer<u64>> {
        self.check_not_inert(id)?;
        self.submit_file_download(id, DataSource::Rendition(kind), dest, priority)
    }

    /// Rendition downloads of a locally known asset with neither master nor
    /// proxy data fail before reaching the network. Unknown assets are left
    /// to the service.
    fn check_not_inert(&self, id: &AssetId) -> Result<()> {
        match self.shared.state().asset(id) {
            Some(asset) if asset.is_transfer_inert() => Err(AssetError::PreconditionFailed(format!(
                "asset {id} has neither master nor proxy data"
            ))),
            _ => Ok(()),
        }
    }

    /// Master/proxy downloads need the asset known locally with the data flag set.
    fn check_data_exists(&self, id: &AssetId, source: DataSource) -> Result<()> {
        let state = self.shared.state();
        let asset = state.asset(id).ok_or_else(|| {
            AssetError::PreconditionFailed(format!("asset {id} is not known locally; refresh it first"))
        })?;
        if !asset.has_data(source) {
            return Err(AssetError::PreconditionFailed(format!(
                "asset {id} has no {source} data"
            )));
        }
        Ok(())
    }

    fn download_data(
        &self,
        id: &AssetId,
        source: DataSource,
        priority: Priority,
    ) -> Result<Transfer<Vec<u8>>> {
        self.check_data_exists(id, source)?;
        let transport = Arc::clone(&self.shared.transport);
        let id = id.clone();
        self.scheduler.submit(
            Direction::Download,
            Some(id.clone()),
            priority,
            move |io| {
                blocking(move || {
                    let mut bytes = Vec::new();
                    transport.download(&id, source, &mut bytes, &io)?;
                    Ok(bytes)
                })
            },
        )
    }

    fn download_data_to_file(
        &self,
        id: &AssetId,
        source: DataSource,
        dest: &Path,
        priority: Priority,
    ) -> Result<Transfer<u64>> {
        self.check_data_exists(id, source)?;
        self.submit_file_download(id, source, dest, priority)
    }

    fn submit_file_download(
        &self,
        id: &AssetId,
        source: DataSource,
        dest: &Path,
        priority: Priority,
    ) -> Result<Transfer<u64>> {
        if dest.as_os_str().is_empty() || dest.is_dir() {
            return Err(AssetError::InvalidArgument(format!(
                "download destination {} is not a file path",
                dest.display()
            )));
        }
        let transport = Arc::clone(&self.shared.transport);
        let id = id.clone();
        let dest = dest.to_path_buf();
        self.scheduler.submit(
            Direction::Download,
            Some(id.clone()),
            priority,
            move |io| {
                blocking(move || {
                    // Dropping the part file on any early return deletes it.
                    let mut part = PartFile::create(&dest)?;
                    transport.download(&id, source, &mut part, &io)?;
                    io.checkpoint()?;
                    let bytes = part.finalize()?;
                    tracing::debug!(asset = %id, %source, path = %dest.display(), bytes, "download complete");
                    Ok(bytes)
                })
            },
        )
    }

    /// Fresh, readable cache entry. Unreadable entries are dropped. The file
    /// is read outside the state lock.
    fn cached_rendition(&self, id: &AssetId, kind: RenditionKind) -> Option<RenditionData> {
        let (location, revision) = {
            let mut state = self.shared.state();
            let lookup = state.cache.lookup(id, kind)?;
            if lookup.stale {
                tracing::debug!(asset = %id, %kind, "cached rendition is stale");
                return None;
            }
            let revision = state.cache.observed_revision(id).map(str::to_string);
            (lookup.location, revision)
        };
        match std::fs::read(&location) {
            Ok(bytes) => {
                tracing::debug!(asset = %id, %kind, "rendition served from cache");
                Some(RenditionData {
                    bytes,
                    from_cache: true,
                    revision,
                })
            }
            Err(e) => {
                tracing::debug!(asset = %id, %kind, error = %e, "cached rendition unreadable");
                self.shared.state().cache.remove(id, kind);
                None
            }
        }
    }
}

async fn run_rendition_download(
    shared: Arc<Shared>,
    id: AssetId,
    kind: RenditionKind,
    io: TransferIo,
) -> Result<RenditionData> {
    let transport = Arc::clone(&shared.transport);
    let location: PathBuf = entry_path(&shared.cache_dir, &id, kind);
    let download_id = id.clone();
    let (bytes, info, staged) = blocking(move || {
        let mut bytes = Vec::new();
        let info = transport.download(&download_id, DataSource::Rendition(kind), &mut bytes, &io)?;
        let staged = match StagedFile::write(&location, &bytes) {
            Ok(staged) => Some(staged),
            Err(e) => {
                tracing::warn!(path = %location.display(), error = %e, "could not cache rendition");
                None
            }
        };
        Ok((bytes, info, staged))
    })
    .await?;

    if let Some(staged) = staged {
        let mut state = shared.state();
        // A revision observed while the download ran wins over these bytes.
        if !state.cache.is_current(&id, info.revision.as_deref()) {
            tracing::debug!(
                asset = %id,
                %kind,
                revision = ?info.revision,
                "rendition fetched at an outdated revision; not cached"
            );
        } else {
            let location = staged.final_path().to_path_buf();
            match staged.persist() {
                Ok(()) => {
                    let evicted = state.cache.store(&id, kind, location, info.revision.clone());
                    if !evicted.is_empty() {
                        tracing::debug!(count = evicted.len(), "rendition cache evicted entries");
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %location.display(), error = %e, "could not cache rendition")
                }
            }
        }
    }
    Ok(RenditionData {
        bytes,
        from_cache: false,
        revision: info.revision,
    })
}
