//! Row types for `sqlx::query_as` and their conversions into core types.

use chrono::{DateTime, Utc};

use hunt_core::types::*;

#[derive(Debug, sqlx::FromRow)]
pub struct PgHuntRootRow {
    pub hunt_id: i64,
    pub creator_id: String,
    pub latest_version: i32,
    pub live_version: Option<i32>,
    pub is_deleted: bool,
    pub access_mode: String,
    pub play_slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PgHuntRootRow> for HuntRoot {
    type Error = String;

    fn try_from(r: PgHuntRootRow) -> Result<Self, Self::Error> {
        let access_mode = AccessMode::from_str(&r.access_mode)
            .ok_or_else(|| format!("unknown access_mode '{}' on hunt {}", r.access_mode, r.hunt_id))?;
        Ok(Self {
            hunt_id: HuntId(r.hunt_id),
            creator_id: UserId(r.creator_id),
            latest_version: r.latest_version,
            live_version: r.live_version,
            is_deleted: r.is_deleted,
            access_mode,
            play_slug: r.play_slug,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgVersionRow {
    pub hunt_id: i64,
    pub version: i32,
    pub name: String,
    pub description: String,
    pub cover_image: Option<i64>,
    pub step_order: Vec<i64>,
    pub is_published: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<PgVersionRow> for VersionSnapshot {
    fn from(r: PgVersionRow) -> Self {
        Self {
            hunt_id: HuntId(r.hunt_id),
            version: r.version,
            metadata: SnapshotMetadata {
                name: r.name,
                description: r.description,
                cover_image: r.cover_image.map(AssetId),
            },
            step_order: r.step_order.into_iter().map(StepId).collect(),
            is_published: r.is_published,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgStepRow {
    pub step_id: i64,
    pub hunt_id: i64,
    pub version: i32,
    pub content: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PgStepRow> for Step {
    type Error = String;

    fn try_from(r: PgStepRow) -> Result<Self, Self::Error> {
        let content: StepContent = serde_json::from_value(r.content)
            .map_err(|e| format!("step {} has unreadable content: {e}", r.step_id))?;
        Ok(Self {
            step_id: StepId(r.step_id),
            hunt_id: HuntId(r.hunt_id),
            version: r.version,
            content,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgPublishedRow {
    pub hunt_id: i64,
    pub version: i32,
    pub name: String,
    pub step_count: i32,
    pub published_at: DateTime<Utc>,
    pub published_by: String,
}

impl From<PgPublishedRow> for PublishedRecord {
    fn from(r: PgPublishedRow) -> Self {
        Self {
            hunt_id: HuntId(r.hunt_id),
            version: r.version,
            name: r.name,
            step_count: r.step_count,
            published_at: r.published_at,
            published_by: UserId(r.published_by),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgGrantRow {
    pub hunt_id: i64,
    pub owner_id: String,
    pub shared_with_id: String,
    pub permission: String,
    pub shared_by: String,
    pub shared_at: DateTime<Utc>,
}

impl TryFrom<PgGrantRow> for AccessGrant {
    type Error = String;

    fn try_from(r: PgGrantRow) -> Result<Self, Self::Error> {
        let permission = GrantPermission::from_str(&r.permission).ok_or_else(|| {
            format!(
                "unknown grant permission '{}' on hunt {}",
                r.permission, r.hunt_id
            )
        })?;
        Ok(Self {
            hunt_id: HuntId(r.hunt_id),
            owner_id: UserId(r.owner_id),
            shared_with_id: UserId(r.shared_with_id),
            permission,
            shared_by: UserId(r.shared_by),
            shared_at: r.shared_at,
        })
    }
}
