//! Transport seam between the client and the asset service.
//!
//! A [`Transport`] is blocking: the client calls it from `spawn_blocking`
//! workers and passes a [`TransferIo`] so the implementation can report
//! progress and stop at checkpoints when the transfer is cancelled.

mod credentials;
mod curl;
mod wire;

pub use self::credentials::{CredentialProvider, NoCredentials, StaticToken};
pub use self::curl::CurlTransport;
pub use self::wire::status_error;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::model::{
    AssetId, AssetRef, DataSource, Destination, MetadataPolicy, RenditionDescriptor, RenditionKind,
};
use crate::storage::ByteSink;
use crate::transfer::TransferIo;

/// A local file about to be uploaded, already validated by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub path: PathBuf,
    pub content_type: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the file.
    pub sha256: String,
}

/// Create-asset request: metadata plus the initial master file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAsset {
    pub name: String,
    pub destination: Destination,
    pub source: UploadSource,
}

/// Body of a rendition generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRenditions {
    pub kinds: Vec<RenditionKind>,
    pub metadata: MetadataPolicy,
}

/// Asset JSON as returned by mutating calls, with the digest the service
/// computed over the bytes it received.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetRecord {
    #[serde(flatten)]
    pub asset: AssetRef,
    #[serde(default)]
    pub sha256: Option<String>,
}

impl From<AssetRef> for AssetRecord {
    fn from(asset: AssetRef) -> Self {
        Self {
            asset,
            sha256: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadInfo {
    pub bytes: u64,
    /// Revision tag reported with the bytes (HTTP `ETag`).
    pub revision: Option<String>,
}

pub trait Transport: Send + Sync + 'static {
    fn create_asset(&self, request: &CreateAsset, io: &TransferIo) -> Result<AssetRecord>;

    fn fetch_asset(&self, id: &AssetId, io: &TransferIo) -> Result<AssetRef>;

    fn delete_asset(&self, id: &AssetId, io: &TransferIo) -> Result<()>;

    fn upload_master(&self, id: &AssetId, source: &UploadSource, io: &TransferIo)
        -> Result<AssetRecord>;

    fn upload_rendition(
        &self,
        id: &AssetId,
        descriptor: &RenditionDescriptor,
        source: &UploadSource,
        io: &TransferIo,
    ) -> Result<AssetRecord>;

    fn generate_renditions(
        &self,
        id: &AssetId,
        request: &GenerateRenditions,
        io: &TransferIo,
    ) -> Result<Vec<RenditionDescriptor>>;

    /// Stream the bytes of `source` into `sink`.
    fn download(
        &self,
        id: &AssetId,
        source: DataSource,
        sink: &mut dyn ByteSink,
        io: &TransferIo,
    ) -> Result<DownloadInfo>;
}
