//! Snapshot reads shared by the orchestrators.

use crate::error::HuntError;
use crate::ports::{HuntTx, Result};
use crate::types::{order_steps, HuntId, HuntRoot, HuntView, Version};

/// Load a non-deleted root, or the conflated not-found error.
pub async fn load_live_root(tx: &mut dyn HuntTx, hunt_id: HuntId) -> Result<HuntRoot> {
    match tx.load_root(hunt_id).await? {
        Some(root) if !root.is_deleted => Ok(root),
        _ => Err(HuntError::hunt_not_found()),
    }
}

/// Load one snapshot of a hunt with its steps in `step_order` order.
pub async fn load_view(tx: &mut dyn HuntTx, hunt_id: HuntId, version: Version) -> Result<HuntView> {
    let root = load_live_root(tx, hunt_id).await?;
    let snapshot = tx
        .load_snapshot(hunt_id, version)
        .await?
        .ok_or_else(|| HuntError::NotFound(format!("version {version} of hunt {hunt_id} not found")))?;
    let steps = tx.load_steps(hunt_id, version).await?;
    let steps = order_steps(&snapshot.step_order, steps)?;
    Ok(HuntView {
        root,
        snapshot,
        steps,
    })
}
