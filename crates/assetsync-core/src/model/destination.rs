//! Where a newly created asset is registered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A collection or catalog that owns an ordered list of assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Destination {
    Collection(String),
    Catalog(String),
}

impl Destination {
    pub fn id(&self) -> &str {
        match self {
            Destination::Collection(id) | Destination::Catalog(id) => id,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Collection(id) => write!(f, "collection {id}"),
            Destination::Catalog(id) => write!(f, "catalog {id}"),
        }
    }
}
