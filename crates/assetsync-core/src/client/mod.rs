//! Asset client: validates requests, turns them into scheduler jobs and
//! commits their results to the local asset table and rendition cache.
//!
//! Every operation validates synchronously (returning `Err` before anything
//! is queued) and otherwise returns a [`Transfer`] that resolves exactly once.
//! Job results are committed under the state lock before the outcome is
//! delivered, so a caller that sees `Completed` also sees the updated
//! snapshot through [`AssetClient::asset`].

mod assets;
mod downloads;
mod renditions;
mod state;
mod uploads;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::RenditionCache;
use crate::config::{ClientConfig, DEFAULT_MAX_MASTER_UPLOAD_BYTES};
use crate::error::{AssetError, Result};
use crate::model::{AssetId, AssetRef, Destination, RenditionDescriptor};
use crate::scheduler::{TransferScheduler, DEFAULT_MAX_CONCURRENT};
use crate::transfer::Transfer;
use crate::transport::{CredentialProvider, CurlTransport, Transport};

use self::state::ClientState;

pub use self::uploads::infer_content_type;

/// Construction parameters for [`AssetClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub max_concurrent_transfers: usize,
    pub max_master_upload_bytes: u64,
    pub cache_capacity: Option<usize>,
    pub cache_dir: PathBuf,
    pub progress_step: f64,
}

impl ClientOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT,
            max_master_upload_bytes: DEFAULT_MAX_MASTER_UPLOAD_BYTES,
            cache_capacity: None,
            cache_dir: cache_dir.into(),
            progress_step: 0.01,
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        Ok(Self {
            max_concurrent_transfers: cfg.max_concurrent_transfers,
            max_master_upload_bytes: cfg.max_master_upload_bytes,
            cache_capacity: cfg.cache_capacity,
            cache_dir: cfg.resolved_cache_dir()?,
            progress_step: cfg.progress_step,
        })
    }
}

/// Bytes of a rendition and where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionData {
    pub bytes: Vec<u8>,
    pub from_cache: bool,
    pub revision: Option<String>,
}

/// Result of a master upload. With auto-generation requested, `renditions`
/// is the chained generation transfer.
#[derive(Debug)]
pub struct MasterUpload {
    pub asset: AssetRef,
    pub renditions: Option<Transfer<Vec<RenditionDescriptor>>>,
}

/// Everything a running job needs. Jobs hold this, never the scheduler, so
/// queued work does not keep the scheduler alive.
pub(crate) struct Shared {
    transport: Arc<dyn Transport>,
    state: Mutex<ClientState>,
    cache_dir: PathBuf,
    max_master_upload_bytes: u64,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct AssetClient {
    shared: Arc<Shared>,
    scheduler: Arc<TransferScheduler>,
}

impl AssetClient {
    /// Must be called from within a Tokio runtime (the scheduler spawns its
    /// dispatcher task).
    pub fn new(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        let scheduler =
            TransferScheduler::new(options.max_concurrent_transfers, options.progress_step);
        tracing::debug!(
            max_concurrent = scheduler.max_concurrent(),
            cache_dir = %options.cache_dir.display(),
            "asset client started"
        );
        Self {
            shared: Arc::new(Shared {
                transport,
                state: Mutex::new(ClientState::new(RenditionCache::new(options.cache_capacity))),
                cache_dir: options.cache_dir,
                max_master_upload_bytes: options.max_master_upload_bytes,
            }),
            scheduler: Arc::new(scheduler),
        }
    }

    /// Client backed by [`CurlTransport`] using `cfg`'s base URL and HTTP settings.
    pub fn from_config(
        cfg: &ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> anyhow::Result<Self> {
        let transport = CurlTransport::from_config(cfg, credentials)?;
        Ok(Self::new(Arc::new(transport), ClientOptions::from_config(cfg)?))
    }

    pub fn scheduler(&self) -> &TransferScheduler {
        &self.scheduler
    }

    /// Snapshot of a locally known asset.
    pub fn asset(&self, id: &AssetId) -> Option<AssetRef> {
        self.shared.state().asset(id)
    }

    /// Snapshots of the assets registered in `destination`, in insertion order.
    pub fn assets_in(&self, destination: &Destination) -> Vec<AssetRef> {
        self.shared.state().assets_in(destination)
    }

    /// Forget an asset locally (table, destination lists, cached renditions).
    /// Returns true if it was known.
    pub fn evict(&self, id: &AssetId) -> bool {
        self.shared.state().remove_asset(id)
    }

    /// Drop all cached renditions of `id`. Returns how many were dropped.
    pub fn invalidate_renditions(&self, id: &AssetId) -> usize {
        self.shared.state().cache.invalidate(id)
    }

    /// Cancel queued transfers, ask running ones to abort, wait for the pool to drain.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        tracing::debug!("asset client shut down");
    }
}

/// Run blocking transport work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(AssetError::Cancelled),
        Err(e) => Err(AssetError::Io(std::io::Error::other(format!(
            "transfer worker failed: {e}"
        )))),
    }
}

#[cfg(test)]
mod tests;
