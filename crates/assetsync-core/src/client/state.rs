//! Local asset table, destination lists and the rendition cache, guarded
//! together by one lock in [`super::Shared`].

use std::collections::HashMap;

use crate::cache::RenditionCache;
use crate::model::{AssetId, AssetRef, Destination};

pub(crate) struct ClientState {
    assets: HashMap<AssetId, AssetRef>,
    destinations: HashMap<Destination, Vec<AssetId>>,
    pub(crate) cache: RenditionCache,
}

impl ClientState {
    pub(crate) fn new(cache: RenditionCache) -> Self {
        Self {
            assets: HashMap::new(),
            destinations: HashMap::new(),
            cache,
        }
    }

    pub(crate) fn asset(&self, id: &AssetId) -> Option<AssetRef> {
        self.assets.get(id).cloned()
    }

    pub(crate) fn asset_mut(&mut self, id: &AssetId) -> Option<&mut AssetRef> {
        self.assets.get_mut(id)
    }

    pub(crate) fn assets_in(&self, destination: &Destination) -> Vec<AssetRef> {
        self.destinations
            .get(destination)
            .map(|ids| ids.iter().filter_map(|id| self.asset(id)).collect())
            .unwrap_or_default()
    }

    /// Replace the snapshot for `asset.id`. A revision different from the one
    /// last observed invalidates the asset's cached renditions.
    pub(crate) fn commit_asset(&mut self, asset: AssetRef) {
        if let Some(revision) = asset.revision.as_deref() {
            if self.cache.observe_revision(&asset.id, revision) {
                let dropped = self.cache.invalidate(&asset.id);
                tracing::debug!(asset = %asset.id, revision, dropped, "asset revision changed");
            }
        }
        self.assets.insert(asset.id.clone(), asset);
    }

    pub(crate) fn register(&mut self, destination: &Destination, id: &AssetId) {
        let ids = self.destinations.entry(destination.clone()).or_default();
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }

    /// Remove from table, every destination list and the cache.
    pub(crate) fn remove_asset(&mut self, id: &AssetId) -> bool {
        let known = self.assets.remove(id).is_some();
        for ids in self.destinations.values_mut() {
            ids.retain(|other| other != id);
        }
        self.destinations.retain(|_, ids| !ids.is_empty());
        self.cache.forget(id);
        known
    }
}
