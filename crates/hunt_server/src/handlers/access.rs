//! Sharing handlers.
//!
//! GET    /hunts/:id/access        caller's role and capabilities
//! GET    /hunts/:id/grants        grants ordered by shared_at
//! PUT    /hunts/:id/grants/:user  grant or change access
//! DELETE /hunts/:id/grants/:user  revoke (or leave)

use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, Extension, Json};
use hunt_core::{
    permission::AccessContext,
    principal::Principal,
    service::HuntService,
    types::{AccessGrant, GrantPermission, HuntId, UserId},
};
use serde::Deserialize;

use crate::error::AppError;

pub async fn get_access(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
) -> Result<Json<AccessContext>, AppError> {
    Ok(Json(service.get_access(&principal, HuntId(id)).await?))
}

pub async fn list_grants(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<AccessGrant>>, AppError> {
    Ok(Json(service.list_grants(&principal, HuntId(id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub permission: GrantPermission,
}

pub async fn share_hunt(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path((id, user)): Path<(i64, String)>,
    Json(req): Json<ShareRequest>,
) -> Result<Json<AccessGrant>, AppError> {
    let grant = service
        .share_hunt(&principal, HuntId(id), UserId(user), req.permission)
        .await?;
    Ok(Json(grant))
}

pub async fn revoke_access(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path((id, user)): Path<(i64, String)>,
) -> Result<StatusCode, AppError> {
    service
        .revoke_access(&principal, HuntId(id), UserId(user))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
