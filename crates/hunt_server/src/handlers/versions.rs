//! Version lifecycle handlers.
//!
//! POST /hunts/:id/publish            freeze the draft, optionally release it
//! POST /hunts/:id/release            point live at a published version
//! POST /hunts/:id/offline            clear the live pointer
//! GET  /hunts/:id/versions           publish history
//! GET  /hunts/:id/versions/:version  any snapshot

use std::sync::Arc;

use axum::{extract::Path, Extension, Json};
use hunt_core::{
    principal::Principal,
    service::HuntService,
    types::{HuntId, HuntView, PublishResult, ReleaseResult, Version, VersionHistory},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub release: bool,
    #[serde(default)]
    pub expected_current_live: Option<Version>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    #[serde(flatten)]
    pub publish: PublishResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseResult>,
}

/// Publishing commits before the optional release runs; a failed release
/// leaves the new version published but not live.
pub async fn publish(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
    body: Option<Json<PublishRequest>>,
) -> Result<Json<PublishResponse>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let hunt_id = HuntId(id);
    let publish = service.publish(&principal, hunt_id).await?;
    let release = if req.release {
        Some(
            service
                .release(
                    &principal,
                    hunt_id,
                    publish.published_version,
                    req.expected_current_live,
                )
                .await?,
        )
    } else {
        None
    };
    Ok(Json(PublishResponse { publish, release }))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub version: Version,
    #[serde(default)]
    pub expected_current_live: Option<Version>,
}

pub async fn release(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
    Json(req): Json<ReleaseRequest>,
) -> Result<Json<ReleaseResult>, AppError> {
    let result = service
        .release(&principal, HuntId(id), req.version, req.expected_current_live)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
pub struct OfflineRequest {
    #[serde(default)]
    pub expected_current_live: Option<Version>,
}

pub async fn take_offline(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
    body: Option<Json<OfflineRequest>>,
) -> Result<Json<ReleaseResult>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let result = service
        .take_offline(&principal, HuntId(id), req.expected_current_live)
        .await?;
    Ok(Json(result))
}

pub async fn list_versions(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
) -> Result<Json<VersionHistory>, AppError> {
    Ok(Json(service.list_versions(&principal, HuntId(id)).await?))
}

pub async fn get_version(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path((id, version)): Path<(i64, Version)>,
) -> Result<Json<HuntView>, AppError> {
    Ok(Json(
        service.get_version(&principal, HuntId(id), version).await?,
    ))
}
