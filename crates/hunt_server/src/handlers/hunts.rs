//! Hunt document handlers.
//!
//! POST   /hunts             create a hunt with an empty draft
//! GET    /hunts/:id         draft with ordered steps and caller access
//! PUT    /hunts/:id         full-document save onto the draft
//! DELETE /hunts/:id         soft delete (owner only)
//! POST   /hunts/:id/clone   copy a snapshot into a new hunt
//! GET    /play/:slug        live snapshot for players, no auth

use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, Extension, Json};
use hunt_core::{
    principal::Principal,
    save::SaveOutcome,
    service::{HuntDetail, HuntService},
    types::{CloneResult, CreateHuntInput, HuntId, HuntView, SaveHuntPayload, Version},
};
use serde::Deserialize;

use crate::error::AppError;

pub async fn create_hunt(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Json(input): Json<CreateHuntInput>,
) -> Result<(StatusCode, Json<HuntDetail>), AppError> {
    let detail = service.create_hunt(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_hunt(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
) -> Result<Json<HuntDetail>, AppError> {
    Ok(Json(service.get_hunt(&principal, HuntId(id)).await?))
}

pub async fn save_hunt(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
    Json(payload): Json<SaveHuntPayload>,
) -> Result<Json<SaveOutcome>, AppError> {
    Ok(Json(service.save_hunt(&principal, HuntId(id), payload).await?))
}

pub async fn delete_hunt(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    service.delete_hunt(&principal, HuntId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct CloneRequest {
    #[serde(default)]
    pub version: Option<Version>,
}

pub async fn clone_hunt(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(id): Path<i64>,
    body: Option<Json<CloneRequest>>,
) -> Result<(StatusCode, Json<CloneResult>), AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let result = service.clone_hunt(&principal, HuntId(id), req.version).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn play(
    Extension(service): Extension<Arc<dyn HuntService>>,
    Path(slug): Path<String>,
) -> Result<Json<HuntView>, AppError> {
    Ok(Json(service.get_live_hunt(&slug).await?))
}
