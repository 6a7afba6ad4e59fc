//! Permission resolver: the gate every hunt operation passes through.
//!
//! Owner access is implicit (the hunt's creator); everybody else needs an
//! [`AccessGrant`]. A caller without any access gets the same `NotFound` as
//! a caller asking for a hunt that does not exist.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HuntError;
use crate::ports::{HuntStore, Result};
use crate::types::{GrantPermission, HuntId, HuntRoot, UserId};

/// Effective permission, ordered `View < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Admin,
    Owner,
}

impl Permission {
    pub fn rank(&self) -> u8 {
        match self {
            Self::View => 1,
            Self::Admin => 3,
            Self::Owner => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    pub fn satisfies(&self, required: Permission) -> bool {
        self.rank() >= required.rank()
    }
}

impl PartialOrd for Permission {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Permission {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl From<GrantPermission> for Permission {
    fn from(p: GrantPermission) -> Self {
        match p {
            GrantPermission::View => Self::View,
            GrantPermission::Admin => Self::Admin,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_publish: bool,
    pub can_release: bool,
    pub can_delete: bool,
    pub can_share: bool,
    pub can_clone: bool,
}

impl Capabilities {
    pub fn for_permission(permission: Permission) -> Self {
        match permission {
            Permission::Owner => Self {
                can_edit: true,
                can_publish: true,
                can_release: true,
                can_delete: true,
                can_share: true,
                can_clone: true,
            },
            Permission::Admin => Self {
                can_edit: true,
                can_publish: true,
                can_release: true,
                can_delete: false,
                can_share: true,
                can_clone: true,
            },
            Permission::View => Self {
                can_edit: false,
                can_publish: false,
                can_release: false,
                can_delete: false,
                can_share: false,
                can_clone: true,
            },
        }
    }
}

/// A caller's resolved access to one hunt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessContext {
    pub hunt_id: HuntId,
    pub user_id: UserId,
    pub owner_id: UserId,
    pub permission: Permission,
    pub capabilities: Capabilities,
    /// The root as it was when access was resolved. Not serialized; callers
    /// re-read it inside their transaction before writing.
    #[serde(skip)]
    pub root: Option<HuntRoot>,
}

impl AccessContext {
    pub fn is_owner(&self) -> bool {
        self.permission == Permission::Owner
    }
}

/// Resolves `(hunt_id, user_id)` to an [`AccessContext`].
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn HuntStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn HuntStore>) -> Self {
        Self { store }
    }

    /// `None` when the hunt is missing, deleted, or the user has no grant.
    pub async fn resolve(&self, hunt_id: HuntId, user_id: &UserId) -> Result<Option<AccessContext>> {
        let Some(root) = self.store.load_root(hunt_id).await? else {
            return Ok(None);
        };
        if root.is_deleted {
            return Ok(None);
        }

        let permission = if &root.creator_id == user_id {
            Permission::Owner
        } else {
            match self.store.load_grant(hunt_id, user_id).await? {
                Some(grant) => grant.permission.into(),
                None => return Ok(None),
            }
        };

        Ok(Some(AccessContext {
            hunt_id,
            user_id: user_id.clone(),
            owner_id: root.creator_id.clone(),
            permission,
            capabilities: Capabilities::for_permission(permission),
            root: Some(root),
        }))
    }

    /// Resolve and demand at least `min`.
    pub async fn require(
        &self,
        hunt_id: HuntId,
        user_id: &UserId,
        min: Permission,
    ) -> Result<AccessContext> {
        let ctx = self
            .resolve(hunt_id, user_id)
            .await?
            .ok_or_else(HuntError::hunt_not_found)?;
        if !ctx.permission.satisfies(min) {
            tracing::debug!(
                hunt_id = %hunt_id,
                user_id = %user_id,
                have = %ctx.permission,
                need = %min,
                "permission denied"
            );
            return Err(HuntError::Forbidden(format!(
                "{min} permission required, caller has {}",
                ctx.permission
            )));
        }
        Ok(ctx)
    }
}
