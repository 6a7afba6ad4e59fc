//! Save orchestrator. Applies one full-document edit to a hunt's draft in a
//! single all-or-nothing transaction.
//!
//! Execution order (no persisted state machine, but strictly sequential):
//!
//! | # | Step                                   | Failure                          |
//! |---|----------------------------------------|----------------------------------|
//! | 1 | require Admin                          | NotFound / Forbidden             |
//! | 2 | structural + asset validation          | Validation / NotFound / Forbidden|
//! | 3 | begin tx, lock snapshot, diff steps    | Validation (foreign/dup ids)     |
//! | 4 | CAS metadata onto the draft            | see `disambiguate`               |
//! | 5 | delete, CAS-update, insert steps       | Conflict / Internal              |
//! | 6 | recompute and write `step_order`       | Internal                         |
//! | 7 | rebuild asset usage (same tx)          | Internal                         |
//! | 8 | reload, commit                         | Internal                         |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::diff::{diff_steps, resolve_step_order, StepDiff};
use crate::error::HuntError;
use crate::permission::{Permission, PermissionResolver};
use crate::ports::{
    AssetUsageTracker, AssetValidator, Counter, HuntStore, HuntTx, Result, SequenceAllocator,
};
use crate::principal::Principal;
use crate::read::{load_live_root, load_view};
use crate::types::{HuntId, HuntView, SaveHuntPayload, Step, StepId, Version};
use crate::validate::validate_payload;

/// What a save did, alongside the reloaded hunt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub hunt: HuntView,
    pub created: Vec<StepId>,
    pub updated: Vec<StepId>,
    pub deleted: Vec<StepId>,
}

pub struct SaveOrchestrator {
    store: Arc<dyn HuntStore>,
    permissions: PermissionResolver,
    sequences: Arc<dyn SequenceAllocator>,
    asset_validator: Arc<dyn AssetValidator>,
    asset_usage: Arc<dyn AssetUsageTracker>,
}

impl SaveOrchestrator {
    pub fn new(
        store: Arc<dyn HuntStore>,
        permissions: PermissionResolver,
        sequences: Arc<dyn SequenceAllocator>,
        asset_validator: Arc<dyn AssetValidator>,
        asset_usage: Arc<dyn AssetUsageTracker>,
    ) -> Self {
        Self {
            store,
            permissions,
            sequences,
            asset_validator,
            asset_usage,
        }
    }

    /// Save `payload` as the complete new state of the hunt's draft.
    ///
    /// A payload that names a version which has since been published fails
    /// with the edit-published validation error.
    pub async fn save_hunt(
        &self,
        hunt_id: HuntId,
        payload: &SaveHuntPayload,
        principal: &Principal,
    ) -> Result<SaveOutcome> {
        let user_id = &principal.user_id;

        // 1-2: gate and fail fast before any transaction opens.
        self.permissions
            .require(hunt_id, user_id, Permission::Admin)
            .await?;
        validate_payload(payload)?;
        self.asset_validator
            .validate_or_throw(&payload.asset_refs(), user_id)
            .await?;

        // 3: read and diff inside the transaction.
        let mut tx = self.store.begin().await?;
        let root = load_live_root(tx.as_mut(), hunt_id).await?;
        let version = payload.version.unwrap_or(root.latest_version);
        if version < 1 || version > root.latest_version {
            return Err(HuntError::NotFound(format!(
                "version {version} of hunt {hunt_id} not found"
            )));
        }
        // Row lock first: the steps read below must include every committed save.
        let current = tx.lock_draft(hunt_id, version).await?.ok_or_else(|| {
            HuntError::Internal(anyhow::anyhow!(
                "snapshot v{version} of hunt {hunt_id} missing below latest_version"
            ))
        })?;
        let existing = tx.load_steps(hunt_id, version).await?;
        let diff = diff_steps(&payload.steps, &existing)?;
        tracing::debug!(
            hunt_id = %hunt_id,
            version,
            create = diff.to_create.len(),
            update = diff.to_update.len(),
            delete = diff.to_delete.len(),
            unchanged = diff.unchanged.len(),
            "step diff computed"
        );

        // 4: metadata under the draft precondition.
        let now = clock::next_after(current.updated_at);
        let matched = tx
            .update_draft_metadata(
                hunt_id,
                version,
                &payload.metadata,
                payload.updated_at,
                now,
            )
            .await?;
        if !matched {
            return Err(disambiguate(tx.as_mut(), hunt_id, version, payload.updated_at).await);
        }

        // 5: step writes.
        let created = self
            .apply_step_writes(tx.as_mut(), hunt_id, version, &diff, now)
            .await?;

        // 6: order.
        let order = resolve_step_order(&payload.steps, &created)?;
        if !tx.set_step_order(hunt_id, version, &order, now).await? {
            return Err(HuntError::Internal(anyhow::anyhow!(
                "step order write on hunt {hunt_id} v{version} matched no draft"
            )));
        }
        tracing::debug!(hunt_id = %hunt_id, version, steps = order.len(), "step order rewritten");

        // 7: asset usage, same transaction.
        self.asset_usage
            .rebuild_hunt_asset_usage(hunt_id, tx.as_mut())
            .await?;

        // 8: reload and commit.
        let hunt = load_view(tx.as_mut(), hunt_id, version).await?;
        tx.commit().await?;

        let updated: Vec<StepId> = diff.to_update.iter().map(|u| u.step_id).collect();
        tracing::info!(
            hunt_id = %hunt_id,
            version,
            user_id = %user_id,
            created = created.len(),
            updated = updated.len(),
            deleted = diff.to_delete.len(),
            "hunt saved"
        );
        Ok(SaveOutcome {
            hunt,
            created,
            updated,
            deleted: diff.to_delete,
        })
    }

    /// Delete, update, then insert. Returns the ids allocated for new steps,
    /// in creation order.
    async fn apply_step_writes(
        &self,
        tx: &mut dyn HuntTx,
        hunt_id: HuntId,
        version: Version,
        diff: &StepDiff,
        now: DateTime<Utc>,
    ) -> Result<Vec<StepId>> {
        if !diff.to_delete.is_empty() {
            tx.delete_steps(hunt_id, version, &diff.to_delete).await?;
        }

        for update in &diff.to_update {
            let matched = tx
                .update_step(
                    hunt_id,
                    version,
                    update.step_id,
                    &update.content,
                    update.expected_updated_at,
                    now,
                )
                .await?;
            if !matched {
                if update.expected_updated_at.is_some() {
                    tracing::warn!(
                        hunt_id = %hunt_id,
                        step_id = %update.step_id,
                        "step modified concurrently"
                    );
                    return Err(HuntError::draft_conflict());
                }
                return Err(HuntError::Internal(anyhow::anyhow!(
                    "unconditional update of step {} on hunt {hunt_id} v{version} matched nothing",
                    update.step_id
                )));
            }
        }

        if diff.to_create.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<StepId> = self
            .sequences
            .next_n(Counter::StepId, diff.to_create.len())
            .await?
            .into_iter()
            .map(StepId)
            .collect();
        let steps: Vec<Step> = ids
            .iter()
            .zip(&diff.to_create)
            .map(|(id, content)| Step {
                step_id: *id,
                hunt_id,
                version,
                content: content.clone(),
                updated_at: now,
            })
            .collect();
        tx.insert_steps(&steps).await?;
        Ok(ids)
    }
}

/// Explain a metadata write that matched zero rows.
async fn disambiguate(
    tx: &mut dyn HuntTx,
    hunt_id: HuntId,
    version: Version,
    supplied: Option<DateTime<Utc>>,
) -> HuntError {
    let snapshot = match tx.load_snapshot(hunt_id, version).await {
        Ok(snapshot) => snapshot,
        Err(e) => return e,
    };
    match snapshot {
        Some(s) if s.is_published => {
            tracing::warn!(hunt_id = %hunt_id, version, "save rejected: version is published");
            HuntError::edit_published()
        }
        Some(s) if supplied.is_some_and(|t| t != s.updated_at) => {
            tracing::warn!(
                hunt_id = %hunt_id,
                version,
                supplied = ?supplied,
                stored = %s.updated_at,
                "save rejected: stale updated_at"
            );
            HuntError::draft_conflict()
        }
        Some(_) => {
            let err = anyhow::anyhow!(
                "draft metadata write on hunt {hunt_id} v{version} matched nothing \
                 although the draft is unpublished and current"
            );
            tracing::error!(error = %err, "save failed");
            HuntError::Internal(err)
        }
        None => {
            let err = anyhow::anyhow!("snapshot v{version} of hunt {hunt_id} vanished during save");
            tracing::error!(error = %err, "save failed");
            HuntError::Internal(err)
        }
    }
}
