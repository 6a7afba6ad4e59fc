//! Asset-usage reindexing.

use async_trait::async_trait;

use crate::error::HuntError;
use crate::ports::{AssetUsageTracker, HuntTx, Result};
use crate::types::{AssetId, HuntId, Step, VersionSnapshot};

/// Every asset referenced by a snapshot and its steps, deduplicated, in
/// first-seen order (cover image first, then steps in storage order).
pub fn collect_asset_refs(snapshot: &VersionSnapshot, steps: &[Step]) -> Vec<AssetId> {
    let mut refs = Vec::new();
    let all = snapshot
        .metadata
        .cover_image
        .into_iter()
        .chain(steps.iter().flat_map(|s| s.content.asset_refs()));
    for asset in all {
        if !refs.contains(&asset) {
            refs.push(asset);
        }
    }
    refs
}

/// Rebuilds a hunt's usage index from its current draft, reading and writing
/// through the caller's transaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct DraftAssetUsageTracker;

#[async_trait]
impl AssetUsageTracker for DraftAssetUsageTracker {
    async fn rebuild_hunt_asset_usage(&self, hunt_id: HuntId, tx: &mut dyn HuntTx) -> Result<()> {
        let root = tx.load_root(hunt_id).await?.ok_or_else(|| {
            HuntError::Internal(anyhow::anyhow!("asset reindex: hunt {hunt_id} vanished"))
        })?;
        let draft = tx
            .load_snapshot(hunt_id, root.draft_version())
            .await?
            .ok_or_else(|| {
                HuntError::Internal(anyhow::anyhow!(
                    "asset reindex: draft v{} of hunt {hunt_id} missing",
                    root.draft_version()
                ))
            })?;
        let steps = tx.load_steps(hunt_id, draft.version).await?;
        let refs = collect_asset_refs(&draft, &steps);
        tracing::debug!(hunt_id = %hunt_id, assets = refs.len(), "asset usage rebuilt");
        tx.replace_asset_usage(hunt_id, &refs).await
    }
}
