//! Clone engine: deep-copies one snapshot of a hunt into a brand-new hunt
//! owned by the caller.

use std::collections::HashMap;
use std::sync::Arc;

use crate::clock;
use crate::error::HuntError;
use crate::permission::{Permission, PermissionResolver};
use crate::ports::{AssetUsageTracker, Counter, HuntStore, Result, SequenceAllocator};
use crate::principal::Principal;
use crate::read::load_live_root;
use crate::slug::generate_play_slug;
use crate::types::{
    AccessMode, CloneResult, HuntId, HuntRoot, Step, StepId, Version, VersionSnapshot,
};

pub struct CloneEngine {
    store: Arc<dyn HuntStore>,
    permissions: PermissionResolver,
    sequences: Arc<dyn SequenceAllocator>,
    asset_usage: Arc<dyn AssetUsageTracker>,
}

impl CloneEngine {
    pub fn new(
        store: Arc<dyn HuntStore>,
        permissions: PermissionResolver,
        sequences: Arc<dyn SequenceAllocator>,
        asset_usage: Arc<dyn AssetUsageTracker>,
    ) -> Self {
        Self {
            store,
            permissions,
            sequences,
            asset_usage,
        }
    }

    /// Copy `version` (default: the source's current draft) of
    /// `source_hunt_id` into a new private hunt at version 1.
    pub async fn clone_hunt(
        &self,
        source_hunt_id: HuntId,
        version: Option<Version>,
        principal: &Principal,
    ) -> Result<CloneResult> {
        self.permissions
            .require(source_hunt_id, &principal.user_id, Permission::View)
            .await?;

        let mut tx = self.store.begin().await?;
        let source_root = load_live_root(tx.as_mut(), source_hunt_id).await?;
        let source_version = version.unwrap_or(source_root.latest_version);
        let source = tx
            .load_snapshot(source_hunt_id, source_version)
            .await?
            .ok_or_else(|| {
                HuntError::NotFound(format!(
                    "version {source_version} of hunt {source_hunt_id} not found"
                ))
            })?;
        let source_steps = tx.load_steps(source_hunt_id, source_version).await?;

        let hunt_id = HuntId(self.sequences.next(Counter::HuntId).await?);
        let now = clock::now();
        tx.insert_root(&HuntRoot {
            hunt_id,
            creator_id: principal.user_id.clone(),
            latest_version: 1,
            live_version: None,
            is_deleted: false,
            access_mode: AccessMode::Private,
            play_slug: generate_play_slug(&source.metadata.name),
            created_at: now,
            updated_at: now,
        })
        .await?;

        // Fresh ids, remembered so the order can be translated.
        let fresh = self
            .sequences
            .next_n(Counter::StepId, source_steps.len())
            .await?;
        let mut remap: HashMap<StepId, StepId> = HashMap::with_capacity(fresh.len());
        let copies: Vec<Step> = source_steps
            .iter()
            .zip(fresh)
            .map(|(step, id)| {
                remap.insert(step.step_id, StepId(id));
                Step {
                    step_id: StepId(id),
                    hunt_id,
                    version: 1,
                    content: step.content.clone(),
                    updated_at: now,
                }
            })
            .collect();
        let step_order = source
            .step_order
            .iter()
            .map(|old| {
                remap.get(old).copied().ok_or_else(|| {
                    HuntError::Internal(anyhow::anyhow!(
                        "step order of hunt {source_hunt_id} v{source_version} \
                         references step {old} which is not stored"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if step_order.len() != copies.len() {
            return Err(HuntError::Internal(anyhow::anyhow!(
                "hunt {source_hunt_id} v{source_version} stores {} steps but orders {}",
                copies.len(),
                step_order.len()
            )));
        }

        tx.insert_snapshot(&VersionSnapshot {
            hunt_id,
            version: 1,
            metadata: source.metadata.clone(),
            step_order,
            is_published: false,
            updated_at: now,
        })
        .await?;
        tx.insert_steps(&copies).await?;
        self.asset_usage
            .rebuild_hunt_asset_usage(hunt_id, tx.as_mut())
            .await?;
        tx.commit().await?;

        tracing::info!(
            hunt_id = %hunt_id,
            cloned_from = %source_hunt_id,
            cloned_version = source_version,
            steps = copies.len(),
            user_id = %principal.user_id,
            "hunt cloned"
        );
        Ok(CloneResult {
            hunt_id,
            cloned_from_hunt_id: source_hunt_id,
            cloned_from_version: source_version,
            cloned_at: now,
        })
    }
}
