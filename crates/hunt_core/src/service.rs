//! HuntService: the single entry point for every hunt operation.
//!
//! Takes port traits via `Arc<dyn ...>` so the same logic runs against
//! Postgres (hunt_postgres) or the in-memory ports in [`crate::memory`].
//! Every method takes the caller's [`Principal`] explicitly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::assets::DraftAssetUsageTracker;
use crate::clock;
use crate::clone::CloneEngine;
use crate::error::HuntError;
use crate::permission::{AccessContext, Capabilities, Permission, PermissionResolver};
use crate::ports::{AssetUsageTracker, AssetValidator, Counter, HuntStore, Result, SequenceAllocator};
use crate::principal::Principal;
use crate::read::{load_live_root, load_view};
use crate::release::PublishWorkflow;
use crate::save::{SaveOrchestrator, SaveOutcome};
use crate::sharing::SharingService;
use crate::slug::generate_play_slug;
use crate::types::*;
use crate::validate::{into_result, validate_metadata};

/// A hunt's draft together with the caller's access to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntDetail {
    #[serde(flatten)]
    pub hunt: HuntView,
    pub access: AccessContext,
}

// ── HuntService trait ─────────────────────────────────────────

#[async_trait]
pub trait HuntService: Send + Sync {
    /// Create a hunt with an empty draft v1, owned by the caller.
    async fn create_hunt(&self, principal: &Principal, input: CreateHuntInput)
        -> Result<HuntDetail>;

    /// The current draft with ordered steps.
    async fn get_hunt(&self, principal: &Principal, hunt_id: HuntId) -> Result<HuntDetail>;

    /// Any snapshot, draft or published.
    async fn get_version(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<HuntView>;

    async fn list_versions(&self, principal: &Principal, hunt_id: HuntId)
        -> Result<VersionHistory>;

    /// The live snapshot behind a play slug. Unauthenticated.
    async fn get_live_hunt(&self, play_slug: &str) -> Result<HuntView>;

    /// Full-document save onto the draft.
    async fn save_hunt(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        payload: SaveHuntPayload,
    ) -> Result<SaveOutcome>;

    async fn publish(&self, principal: &Principal, hunt_id: HuntId) -> Result<PublishResult>;

    async fn release(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        version: Version,
        expected_current_live: Option<Version>,
    ) -> Result<ReleaseResult>;

    async fn take_offline(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        expected_current_live: Option<Version>,
    ) -> Result<ReleaseResult>;

    async fn clone_hunt(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        version: Option<Version>,
    ) -> Result<CloneResult>;

    async fn get_access(&self, principal: &Principal, hunt_id: HuntId) -> Result<AccessContext>;

    async fn share_hunt(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        shared_with: UserId,
        permission: GrantPermission,
    ) -> Result<AccessGrant>;

    async fn revoke_access(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        shared_with: UserId,
    ) -> Result<()>;

    async fn list_grants(&self, principal: &Principal, hunt_id: HuntId)
        -> Result<Vec<AccessGrant>>;

    /// Soft delete. Owner only.
    async fn delete_hunt(&self, principal: &Principal, hunt_id: HuntId) -> Result<()>;
}

// ── HuntServiceImpl ───────────────────────────────────────────

pub struct HuntServiceImpl {
    store: Arc<dyn HuntStore>,
    permissions: PermissionResolver,
    sequences: Arc<dyn SequenceAllocator>,
    asset_validator: Arc<dyn AssetValidator>,
    asset_usage: Arc<dyn AssetUsageTracker>,
    saves: SaveOrchestrator,
    publishing: PublishWorkflow,
    clones: CloneEngine,
    sharing: SharingService,
}

impl HuntServiceImpl {
    /// Wire the service with the draft-reading asset-usage tracker.
    pub fn new(
        store: Arc<dyn HuntStore>,
        sequences: Arc<dyn SequenceAllocator>,
        asset_validator: Arc<dyn AssetValidator>,
    ) -> Self {
        Self::with_asset_usage(
            store,
            sequences,
            asset_validator,
            Arc::new(DraftAssetUsageTracker),
        )
    }

    pub fn with_asset_usage(
        store: Arc<dyn HuntStore>,
        sequences: Arc<dyn SequenceAllocator>,
        asset_validator: Arc<dyn AssetValidator>,
        asset_usage: Arc<dyn AssetUsageTracker>,
    ) -> Self {
        let permissions = PermissionResolver::new(Arc::clone(&store));
        Self {
            saves: SaveOrchestrator::new(
                Arc::clone(&store),
                permissions.clone(),
                Arc::clone(&sequences),
                Arc::clone(&asset_validator),
                Arc::clone(&asset_usage),
            ),
            publishing: PublishWorkflow::new(
                Arc::clone(&store),
                permissions.clone(),
                Arc::clone(&sequences),
                Arc::clone(&asset_usage),
            ),
            clones: CloneEngine::new(
                Arc::clone(&store),
                permissions.clone(),
                Arc::clone(&sequences),
                Arc::clone(&asset_usage),
            ),
            sharing: SharingService::new(Arc::clone(&store), permissions.clone()),
            store,
            permissions,
            sequences,
            asset_validator,
            asset_usage,
        }
    }
}

#[async_trait]
impl HuntService for HuntServiceImpl {
    async fn create_hunt(
        &self,
        principal: &Principal,
        input: CreateHuntInput,
    ) -> Result<HuntDetail> {
        let metadata = SnapshotMetadata {
            name: input.name,
            description: input.description,
            cover_image: input.cover_image,
        };
        let mut issues = Vec::new();
        validate_metadata(&metadata, &mut issues);
        into_result(issues)?;
        let cover: Vec<AssetId> = metadata.cover_image.into_iter().collect();
        self.asset_validator
            .validate_or_throw(&cover, &principal.user_id)
            .await?;

        let hunt_id = HuntId(self.sequences.next(Counter::HuntId).await?);
        let now = clock::now();
        let root = HuntRoot {
            hunt_id,
            creator_id: principal.user_id.clone(),
            latest_version: 1,
            live_version: None,
            is_deleted: false,
            access_mode: input.access_mode.unwrap_or_default(),
            play_slug: generate_play_slug(&metadata.name),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_root(&root).await?;
        tx.insert_snapshot(&VersionSnapshot {
            hunt_id,
            version: 1,
            metadata,
            step_order: Vec::new(),
            is_published: false,
            updated_at: now,
        })
        .await?;
        self.asset_usage
            .rebuild_hunt_asset_usage(hunt_id, tx.as_mut())
            .await?;
        let hunt = load_view(tx.as_mut(), hunt_id, 1).await?;
        tx.commit().await?;

        tracing::info!(
            hunt_id = %hunt_id,
            user_id = %principal.user_id,
            play_slug = %root.play_slug,
            "hunt created"
        );
        let access = AccessContext {
            hunt_id,
            user_id: principal.user_id.clone(),
            owner_id: principal.user_id.clone(),
            permission: Permission::Owner,
            capabilities: Capabilities::for_permission(Permission::Owner),
            root: Some(root),
        };
        Ok(HuntDetail { hunt, access })
    }

    async fn get_hunt(&self, principal: &Principal, hunt_id: HuntId) -> Result<HuntDetail> {
        let access = self
            .permissions
            .require(hunt_id, &principal.user_id, Permission::View)
            .await?;
        let mut tx = self.store.begin().await?;
        let draft = load_live_root(tx.as_mut(), hunt_id).await?.draft_version();
        let hunt = load_view(tx.as_mut(), hunt_id, draft).await?;
        tx.commit().await?;
        Ok(HuntDetail { hunt, access })
    }

    async fn get_version(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<HuntView> {
        self.permissions
            .require(hunt_id, &principal.user_id, Permission::View)
            .await?;
        let mut tx = self.store.begin().await?;
        let view = load_view(tx.as_mut(), hunt_id, version).await?;
        tx.commit().await?;
        Ok(view)
    }

    async fn list_versions(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
    ) -> Result<VersionHistory> {
        self.publishing.list_versions(hunt_id, principal).await
    }

    async fn get_live_hunt(&self, play_slug: &str) -> Result<HuntView> {
        let not_live = || HuntError::NotFound(format!("no live hunt at '{play_slug}'"));
        let root = self
            .store
            .find_root_by_slug(play_slug)
            .await?
            .ok_or_else(not_live)?;
        let live = root.live_version.ok_or_else(not_live)?;
        let mut tx = self.store.begin().await?;
        let view = load_view(tx.as_mut(), root.hunt_id, live).await?;
        tx.commit().await?;
        Ok(view)
    }

    async fn save_hunt(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        payload: SaveHuntPayload,
    ) -> Result<SaveOutcome> {
        self.saves.save_hunt(hunt_id, &payload, principal).await
    }

    async fn publish(&self, principal: &Principal, hunt_id: HuntId) -> Result<PublishResult> {
        self.publishing.publish(hunt_id, principal).await
    }

    async fn release(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        version: Version,
        expected_current_live: Option<Version>,
    ) -> Result<ReleaseResult> {
        self.publishing
            .release(hunt_id, version, expected_current_live, principal)
            .await
    }

    async fn take_offline(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        expected_current_live: Option<Version>,
    ) -> Result<ReleaseResult> {
        self.publishing
            .take_offline(hunt_id, expected_current_live, principal)
            .await
    }

    async fn clone_hunt(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        version: Option<Version>,
    ) -> Result<CloneResult> {
        self.clones.clone_hunt(hunt_id, version, principal).await
    }

    async fn get_access(&self, principal: &Principal, hunt_id: HuntId) -> Result<AccessContext> {
        self.permissions
            .require(hunt_id, &principal.user_id, Permission::View)
            .await
    }

    async fn share_hunt(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        shared_with: UserId,
        permission: GrantPermission,
    ) -> Result<AccessGrant> {
        self.sharing
            .share_hunt(hunt_id, &shared_with, permission, principal)
            .await
    }

    async fn revoke_access(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
        shared_with: UserId,
    ) -> Result<()> {
        self.sharing
            .revoke_access(hunt_id, &shared_with, principal)
            .await
    }

    async fn list_grants(
        &self,
        principal: &Principal,
        hunt_id: HuntId,
    ) -> Result<Vec<AccessGrant>> {
        self.sharing.list_grants(hunt_id, principal).await
    }

    async fn delete_hunt(&self, principal: &Principal, hunt_id: HuntId) -> Result<()> {
        self.permissions
            .require(hunt_id, &principal.user_id, Permission::Owner)
            .await?;
        let mut tx = self.store.begin().await?;
        if !tx.mark_deleted(hunt_id, clock::now()).await? {
            return Err(HuntError::hunt_not_found());
        }
        tx.commit().await?;
        tracing::info!(hunt_id = %hunt_id, user_id = %principal.user_id, "hunt deleted");
        Ok(())
    }
}
