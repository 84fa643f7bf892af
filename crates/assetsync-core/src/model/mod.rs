//! Value types describing remote assets and their renditions.

mod asset;
mod destination;
mod rendition;

pub use asset::{AssetId, AssetRef, AssetType, DataSource};
pub use destination::Destination;
pub use rendition::{FieldRule, MetadataPolicy, MetadataRules, RenditionDescriptor, RenditionKind};
