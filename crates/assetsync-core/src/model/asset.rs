//! Asset snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::AssetError;

use super::rendition::{RenditionDescriptor, RenditionKind};

/// Server-assigned opaque asset identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssetType {
    #[default]
    #[serde(rename = "image")]
    Image,
}

/// Which stored file of an asset a transfer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    Master,
    /// DNG stand-in for the master.
    Proxy,
    Rendition(RenditionKind),
}

impl DataSource {
    /// URL path segments below `assets/{id}/`.
    pub fn path_segments(self) -> Vec<&'static str> {
        match self {
            DataSource::Master => vec!["master"],
            DataSource::Proxy => vec!["proxy"],
            DataSource::Rendition(kind) => vec!["renditions", kind.as_str()],
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Master => f.write_str("master"),
            DataSource::Proxy => f.write_str("proxy"),
            DataSource::Rendition(kind) => write!(f, "rendition {kind}"),
        }
    }
}

impl FromStr for DataSource {
    type Err = AssetError;

    /// Accepts `master`, `proxy`, or any rendition kind string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(DataSource::Master),
            "proxy" => Ok(DataSource::Proxy),
            other => other.parse().map(DataSource::Rendition),
        }
    }
}

/// Snapshot of a remote asset as last seen by the client.
///
/// Snapshots are plain values: changing a returned copy never affects the
/// client's table, its cache, or the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: AssetId,
    pub name: String,
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Url>,
    #[serde(default)]
    pub master_data_exists: bool,
    #[serde(default)]
    pub proxy_data_exists: bool,
    #[serde(default)]
    pub renditions: BTreeMap<RenditionKind, RenditionDescriptor>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Position inside a collection; meaningless outside one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    /// Revision marker used to detect stale cached renditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl AssetRef {
    pub fn new(id: impl Into<AssetId>, name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content_type: content_type.into(),
            size: 0,
            asset_type: AssetType::Image,
            master: None,
            proxy: None,
            master_data_exists: false,
            proxy_data_exists: false,
            renditions: BTreeMap::new(),
            metadata: BTreeMap::new(),
            order: None,
            revision: None,
        }
    }

    /// Neither master nor proxy data exists; downloads of either must fail fast.
    pub fn is_transfer_inert(&self) -> bool {
        !self.master_data_exists && !self.proxy_data_exists
    }

    pub fn rendition(&self, kind: RenditionKind) -> Option<&RenditionDescriptor> {
        self.renditions.get(&kind)
    }

    /// True if the service is known to hold bytes for `source`.
    pub fn has_data(&self, source: DataSource) -> bool {
        match source {
            DataSource::Master => self.master_data_exists,
            DataSource::Proxy => self.proxy_data_exists,
            DataSource::Rendition(kind) => self.rendition(kind).is_some_and(|r| r.available),
        }
    }

    pub fn merge_renditions(&mut self, descriptors: impl IntoIterator<Item = RenditionDescriptor>) {
        for d in descriptors {
            self.renditions.insert(d.kind, d);
        }
    }

    pub fn to_json(&self) -> Result<String, AssetError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(data)?)
    }
}
