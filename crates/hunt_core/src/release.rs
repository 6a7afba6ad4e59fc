//! Publish / release workflow.
//!
//! States per hunt: one Draft (`version = latest_version`), any number of
//! Published versions below it, and at most one of those marked Live.
//! Rollback is just `release` with an older published version.

use std::sync::Arc;

use crate::clock;
use crate::error::HuntError;
use crate::permission::{Permission, PermissionResolver};
use crate::ports::{AssetUsageTracker, Counter, HuntStore, HuntTx, Result, SequenceAllocator};
use crate::principal::Principal;
use crate::read::load_live_root;
use crate::types::{
    order_steps, HuntId, PublishResult, PublishedRecord, ReleaseResult, Step, StepId,
    Version, VersionEntry, VersionHistory, VersionSnapshot,
};

pub struct PublishWorkflow {
    store: Arc<dyn HuntStore>,
    permissions: PermissionResolver,
    sequences: Arc<dyn SequenceAllocator>,
    asset_usage: Arc<dyn AssetUsageTracker>,
}

impl PublishWorkflow {
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

    /// Freeze the current draft and open the next one.
    ///
    /// The new draft is a structural copy of the published snapshot: same
    /// metadata, same step content and order, fresh step ids.
    pub async fn publish(&self, hunt_id: HuntId, principal: &Principal) -> Result<PublishResult> {
        self.permissions
            .require(hunt_id, &principal.user_id, Permission::Admin)
            .await?;

        let mut tx = self.store.begin().await?;
        let root = load_live_root(tx.as_mut(), hunt_id).await?;
        let version = root.latest_version;
        let draft = tx.load_snapshot(hunt_id, version).await?.ok_or_else(|| {
            HuntError::Internal(anyhow::anyhow!(
                "draft v{version} of hunt {hunt_id} missing"
            ))
        })?;
        let steps = tx.load_steps(hunt_id, version).await?;
        if steps.is_empty() {
            return Err(HuntError::Validation(
                "cannot publish a hunt with no steps".into(),
            ));
        }
        let steps = order_steps(&draft.step_order, steps)?;

        let now = clock::next_after(draft.updated_at);
        if !tx.mark_published(hunt_id, version, now).await? {
            tracing::warn!(hunt_id = %hunt_id, version, "publish lost a race on the draft");
            return Err(HuntError::draft_conflict());
        }
        tx.insert_published_record(&PublishedRecord {
            hunt_id,
            version,
            name: draft.metadata.name.clone(),
            step_count: steps.len() as i32,
            published_at: now,
            published_by: principal.user_id.clone(),
        })
        .await?;

        // Copy forward into the next draft.
        let next_version = version + 1;
        let ids: Vec<StepId> = self
            .sequences
            .next_n(Counter::StepId, steps.len())
            .await?
            .into_iter()
            .map(StepId)
            .collect();
        let copies: Vec<Step> = steps
            .iter()
            .zip(&ids)
            .map(|(step, id)| Step {
                step_id: *id,
                hunt_id,
                version: next_version,
                content: step.content.clone(),
                updated_at: now,
            })
            .collect();
        tx.insert_snapshot(&VersionSnapshot {
            hunt_id,
            version: next_version,
            metadata: draft.metadata.clone(),
            step_order: ids,
            is_published: false,
            updated_at: now,
        })
        .await?;
        tx.insert_steps(&copies).await?;

        if !tx
            .advance_latest_version(hunt_id, version, next_version, now)
            .await?
        {
            tracing::warn!(hunt_id = %hunt_id, version, "latest_version moved during publish");
            return Err(HuntError::draft_conflict());
        }
        self.asset_usage
            .rebuild_hunt_asset_usage(hunt_id, tx.as_mut())
            .await?;
        tx.commit().await?;

        tracing::info!(
            hunt_id = %hunt_id,
            published_version = version,
            draft_version = next_version,
            steps = copies.len(),
            user_id = %principal.user_id,
            "hunt published"
        );
        Ok(PublishResult {
            hunt_id,
            published_version: version,
            draft_version: next_version,
            published_at: now,
        })
    }

    /// Point `live_version` at a published version, provided it still equals
    /// `expected_current_live`.
    pub async fn release(
        &self,
        hunt_id: HuntId,
        version: Version,
        expected_current_live: Option<Version>,
        principal: &Principal,
    ) -> Result<ReleaseResult> {
        self.permissions
            .require(hunt_id, &principal.user_id, Permission::Admin)
            .await?;

        let mut tx = self.store.begin().await?;
        let root = load_live_root(tx.as_mut(), hunt_id).await?;
        if tx.load_published_record(hunt_id, version).await?.is_none() {
            if version == root.latest_version {
                return Err(HuntError::Validation(format!(
                    "version {version} is the draft; publish the draft before releasing it"
                )));
            }
            return Err(HuntError::NotFound(format!(
                "published version {version} of hunt {hunt_id} not found"
            )));
        }

        self.swap_live(
            tx,
            hunt_id,
            expected_current_live,
            Some(version),
            principal,
        )
        .await
    }

    /// Clear `live_version`, provided it still equals `expected_current_live`.
    pub async fn take_offline(
        &self,
        hunt_id: HuntId,
        expected_current_live: Option<Version>,
        principal: &Principal,
    ) -> Result<ReleaseResult> {
        self.permissions
            .require(hunt_id, &principal.user_id, Permission::Admin)
            .await?;

        let mut tx = self.store.begin().await?;
        load_live_root(tx.as_mut(), hunt_id).await?;
        self.swap_live(tx, hunt_id, expected_current_live, None, principal)
            .await
    }

    async fn swap_live(
        &self,
        mut tx: Box<dyn HuntTx>,
        hunt_id: HuntId,
        expected: Option<Version>,
        live: Option<Version>,
        principal: &Principal,
    ) -> Result<ReleaseResult> {
        if !tx
            .compare_and_set_live(hunt_id, expected, live, clock::now())
            .await?
        {
            tracing::warn!(
                hunt_id = %hunt_id,
                expected = ?expected,
                requested = ?live,
                "live version changed underneath the caller"
            );
            return Err(HuntError::live_conflict());
        }
        tx.commit().await?;

        match live {
            Some(version) => tracing::info!(
                hunt_id = %hunt_id,
                live_version = version,
                previous = ?expected,
                user_id = %principal.user_id,
                "hunt released"
            ),
            None => tracing::info!(
                hunt_id = %hunt_id,
                previous = ?expected,
                user_id = %principal.user_id,
                "hunt taken offline"
            ),
        }
        Ok(ReleaseResult {
            hunt_id,
            live_version: live,
            previous_live_version: expected,
        })
    }

    /// Publish history, the rollback-target list.
    pub async fn list_versions(
        &self,
        hunt_id: HuntId,
        principal: &Principal,
    ) -> Result<VersionHistory> {
        self.permissions
            .require(hunt_id, &principal.user_id, Permission::View)
            .await?;

        let mut tx = self.store.begin().await?;
        let root = load_live_root(tx.as_mut(), hunt_id).await?;
        let records = tx.list_published_records(hunt_id).await?;
        tx.commit().await?;

        let versions = records
            .into_iter()
            .map(|record| VersionEntry {
                is_live: root.live_version == Some(record.version),
                record,
            })
            .collect();
        Ok(VersionHistory {
            hunt_id,
            latest_version: root.latest_version,
            live_version: root.live_version,
            versions,
        })
    }
}
