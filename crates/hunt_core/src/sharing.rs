//! Access grants: share, revoke, list.
//!
//! Admins may share, but only the owner may hand out or take away Admin.
//! Anyone may revoke their own grant.

use std::sync::Arc;

use crate::clock;
use crate::error::HuntError;
use crate::permission::{Permission, PermissionResolver};
use crate::ports::{HuntStore, Result};
use crate::principal::Principal;
use crate::read::load_live_root;
use crate::types::{AccessGrant, GrantPermission, HuntId, UserId};

pub struct SharingService {
    store: Arc<dyn HuntStore>,
    permissions: PermissionResolver,
}

impl SharingService {
    pub fn new(store: Arc<dyn HuntStore>, permissions: PermissionResolver) -> Self {
        Self { store, permissions }
    }

    pub async fn share_hunt(
        &self,
        hunt_id: HuntId,
        shared_with: &UserId,
        permission: GrantPermission,
        principal: &Principal,
    ) -> Result<AccessGrant> {
        let ctx = self
            .permissions
            .require(hunt_id, &principal.user_id, Permission::Admin)
            .await?;

        if shared_with.as_str().trim().is_empty() {
            return Err(HuntError::Validation("shared_with_id must not be empty".into()));
        }
        if shared_with == &ctx.owner_id {
            return Err(HuntError::Validation(
                "the owner already has full access".into(),
            ));
        }
        if shared_with == &principal.user_id {
            return Err(HuntError::Validation(
                "cannot share a hunt with yourself".into(),
            ));
        }
        if !ctx.is_owner() && permission == GrantPermission::Admin {
            return Err(HuntError::Forbidden(
                "only the owner can grant admin access".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let root = load_live_root(tx.as_mut(), hunt_id).await?;
        let existing = tx
            .list_grants(hunt_id)
            .await?
            .into_iter()
            .find(|g| &g.shared_with_id == shared_with);
        if !ctx.is_owner()
            && existing
                .as_ref()
                .is_some_and(|g| g.permission == GrantPermission::Admin)
        {
            return Err(HuntError::Forbidden(
                "only the owner can change an admin grant".into(),
            ));
        }

        let grant = AccessGrant {
            hunt_id,
            owner_id: root.creator_id,
            shared_with_id: shared_with.clone(),
            permission,
            shared_by: principal.user_id.clone(),
            shared_at: clock::now(),
        };
        tx.upsert_grant(&grant).await?;
        tx.commit().await?;

        tracing::info!(
            hunt_id = %hunt_id,
            shared_with = %shared_with,
            permission = permission.as_str(),
            shared_by = %principal.user_id,
            replaced = existing.is_some(),
            "hunt shared"
        );
        Ok(grant)
    }

    pub async fn revoke_access(
        &self,
        hunt_id: HuntId,
        shared_with: &UserId,
        principal: &Principal,
    ) -> Result<()> {
        let leaving = shared_with == &principal.user_id;
        let ctx = if leaving {
            self.permissions
                .require(hunt_id, &principal.user_id, Permission::View)
                .await?
        } else {
            self.permissions
                .require(hunt_id, &principal.user_id, Permission::Admin)
                .await?
        };

        let mut tx = self.store.begin().await?;
        load_live_root(tx.as_mut(), hunt_id).await?;
        if !leaving && !ctx.is_owner() {
            let target_is_admin = tx
                .list_grants(hunt_id)
                .await?
                .iter()
                .any(|g| &g.shared_with_id == shared_with && g.permission == GrantPermission::Admin);
            if target_is_admin {
                return Err(HuntError::Forbidden(
                    "only the owner can revoke an admin grant".into(),
                ));
            }
        }
        if !tx.delete_grant(hunt_id, shared_with).await? {
            return Err(HuntError::NotFound(format!(
                "no grant for {shared_with} on hunt {hunt_id}"
            )));
        }
        tx.commit().await?;

        tracing::info!(
            hunt_id = %hunt_id,
            shared_with = %shared_with,
            revoked_by = %principal.user_id,
            "access revoked"
        );
        Ok(())
    }

    pub async fn list_grants(
        &self,
        hunt_id: HuntId,
        principal: &Principal,
    ) -> Result<Vec<AccessGrant>> {
        self.permissions
            .require(hunt_id, &principal.user_id, Permission::Admin)
            .await?;
        let mut tx = self.store.begin().await?;
        load_live_root(tx.as_mut(), hunt_id).await?;
        let grants = tx.list_grants(hunt_id).await?;
        tx.commit().await?;
        Ok(grants)
    }
}
