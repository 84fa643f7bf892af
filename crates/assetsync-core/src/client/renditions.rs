//! Rendition generation.

use std::sync::Arc;

use crate::error::{AssetError, Result};
use crate::model::{AssetId, MetadataPolicy, RenditionDescriptor, RenditionKind};
use crate::scheduler::TransferScheduler;
use crate::transfer::{Direction, Priority, Transfer, TransferIo};
use crate::transport::GenerateRenditions;

use super::{blocking, AssetClient, Shared};

impl AssetClient {
    /// Ask the service to (re)generate `kinds` for `id`.
    ///
    /// The metadata policy follows the caller contract: a request for exactly
    /// `[FullSize]` extracts all metadata, anything else extracts none.
    pub fn generate_renditions(
        &self,
        id: &AssetId,
        kinds: &[RenditionKind],
        priority: Priority,
    ) -> Result<Transfer<Vec<RenditionDescriptor>>> {
        let kinds = dedup_kinds(kinds)?;
        let policy = MetadataPolicy::for_kinds(&kinds);
        submit_generate(&self.scheduler, Arc::clone(&self.shared), id, kinds, policy, priority)
    }

    /// Like [`AssetClient::generate_renditions`] with an explicit policy.
    pub fn generate_renditions_with_policy(
        &self,
        id: &AssetId,
        kinds: &[RenditionKind],
        policy: MetadataPolicy,
        priority: Priority,
    ) -> Result<Transfer<Vec<RenditionDescriptor>>> {
        let kinds = dedup_kinds(kinds)?;
        submit_generate(&self.scheduler, Arc::clone(&self.shared), id, kinds, policy, priority)
    }
}

fn dedup_kinds(kinds: &[RenditionKind]) -> Result<Vec<RenditionKind>> {
    if kinds.is_empty() {
        return Err(AssetError::InvalidArgument(
            "no rendition kinds requested".into(),
        ));
    }
    let mut out: Vec<RenditionKind> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !out.contains(kind) {
            out.push(*kind);
        }
    }
    Ok(out)
}

pub(super) fn submit_generate(
    scheduler: &TransferScheduler,
    shared: Arc<Shared>,
    id: &AssetId,
    kinds: Vec<RenditionKind>,
    policy: MetadataPolicy,
    priority: Priority,
) -> Result<Transfer<Vec<RenditionDescriptor>>> {
    let id = id.clone();
    scheduler.submit(
        Direction::Metadata,
        Some(id.clone()),
        priority,
        move |io| run_generate(shared, id, kinds, policy, io),
    )
}

async fn run_generate(
    shared: Arc<Shared>,
    id: AssetId,
    kinds: Vec<RenditionKind>,
    policy: MetadataPolicy,
    io: TransferIo,
) -> Result<Vec<RenditionDescriptor>> {
    let transport = Arc::clone(&shared.transport);
    let request_id = id.clone();
    let request = GenerateRenditions {
        kinds: kinds.clone(),
        metadata: policy,
    };
    let mut descriptors =
        blocking(move || transport.generate_renditions(&request_id, &request, &io)).await?;
    // Descriptors record the policy they were generated with.
    for d in &mut descriptors {
        d.metadata = policy;
    }

    let mut state = shared.state();
    for kind in &kinds {
        state.cache.remove(&id, *kind);
    }
    if let Some(asset) = state.asset_mut(&id) {
        asset.merge_renditions(descriptors.iter().cloned());
    }
    tracing::debug!(asset = %id, ?kinds, ?policy, "renditions generated");
    Ok(descriptors)
}
