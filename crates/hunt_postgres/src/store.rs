//! Postgres implementation of the hunt version store.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) to avoid a
//! compile-time DB requirement. Conditional writes encode their
//! precondition in the WHERE clause and report `rows_affected() > 0`; under
//! READ COMMITTED a concurrent writer's commit is re-evaluated against the
//! predicate, so the check and the write are one atomic step.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use hunt_core::error::HuntError;
use hunt_core::ports::{HuntStore, HuntTx, Result};
use hunt_core::types::*;

use crate::sqlx_types::{PgGrantRow, PgHuntRootRow, PgPublishedRow, PgStepRow, PgVersionRow};

const ROOT_COLUMNS: &str = "hunt_id, creator_id, latest_version, live_version, is_deleted, \
                            access_mode, play_slug, created_at, updated_at";

/// Map a driver error, surfacing unique-key violations as `Conflict`.
pub(crate) fn map_write_err(e: sqlx::Error, what: &str) -> HuntError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return HuntError::Conflict(format!("{what} already exists"));
        }
    }
    HuntError::Internal(anyhow!(e))
}

fn row_err(e: String) -> HuntError {
    HuntError::Internal(anyhow!(e))
}

fn step_ids(ids: &[StepId]) -> Vec<i64> {
    ids.iter().map(|id| id.0).collect()
}

fn content_json(content: &StepContent) -> Result<serde_json::Value> {
    serde_json::to_value(content).map_err(|e| HuntError::Internal(anyhow!(e)))
}

// ── PgHuntStore ───────────────────────────────────────────────

pub struct PgHuntStore {
    pool: PgPool,
}

impl PgHuntStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HuntStore for PgHuntStore {
    async fn begin(&self) -> Result<Box<dyn HuntTx>> {
        let tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        Ok(Box::new(PgHuntTx { tx }))
    }

    async fn load_root(&self, hunt_id: HuntId) -> Result<Option<HuntRoot>> {
        let row = sqlx::query_as::<_, PgHuntRootRow>(&format!(
            "SELECT {ROOT_COLUMNS} FROM hunt.hunts WHERE hunt_id = $1"
        ))
        .bind(hunt_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| HuntRoot::try_from(r).map_err(row_err)).transpose()
    }

    async fn find_root_by_slug(&self, play_slug: &str) -> Result<Option<HuntRoot>> {
        let row = sqlx::query_as::<_, PgHuntRootRow>(&format!(
            "SELECT {ROOT_COLUMNS} FROM hunt.hunts WHERE play_slug = $1 AND NOT is_deleted"
        ))
        .bind(play_slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| HuntRoot::try_from(r).map_err(row_err)).transpose()
    }

    async fn load_grant(&self, hunt_id: HuntId, user_id: &UserId) -> Result<Option<AccessGrant>> {
        let row = sqlx::query_as::<_, PgGrantRow>(
            r#"
            SELECT hunt_id, owner_id, shared_with_id, permission, shared_by, shared_at
            FROM hunt.access_grants
            WHERE hunt_id = $1 AND shared_with_id = $2
            "#,
        )
        .bind(hunt_id.0)
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| AccessGrant::try_from(r).map_err(row_err)).transpose()
    }
}

// ── PgHuntTx ──────────────────────────────────────────────────

/// One database transaction. Dropping it without `commit` rolls back.
pub struct PgHuntTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl HuntTx for PgHuntTx {
    async fn load_root(&mut self, hunt_id: HuntId) -> Result<Option<HuntRoot>> {
        let row = sqlx::query_as::<_, PgHuntRootRow>(&format!(
            "SELECT {ROOT_COLUMNS} FROM hunt.hunts WHERE hunt_id = $1"
        ))
        .bind(hunt_id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| HuntRoot::try_from(r).map_err(row_err)).transpose()
    }

    async fn insert_root(&mut self, root: &HuntRoot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hunt.hunts (
                hunt_id, creator_id, latest_version, live_version, is_deleted,
                access_mode, play_slug, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(root.hunt_id.0)
        .bind(root.creator_id.as_str())
        .bind(root.latest_version)
        .bind(root.live_version)
        .bind(root.is_deleted)
        .bind(root.access_mode.as_str())
        .bind(&root.play_slug)
        .bind(root.created_at)
        .bind(root.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_err(e, &format!("hunt {}", root.hunt_id)))?;
        Ok(())
    }

    async fn advance_latest_version(
        &mut self,
        hunt_id: HuntId,
        expected: Version,
        latest: Version,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE hunt.hunts
            SET latest_version = $3, updated_at = $4
            WHERE hunt_id = $1 AND latest_version = $2 AND NOT is_deleted
            "#,
        )
        .bind(hunt_id.0)
        .bind(expected)
        .bind(latest)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn compare_and_set_live(
        &mut self,
        hunt_id: HuntId,
        expected: Option<Version>,
        live: Option<Version>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE hunt.hunts
            SET live_version = $3, updated_at = $4
            WHERE hunt_id = $1
              AND NOT is_deleted
              AND live_version IS NOT DISTINCT FROM $2::integer
            "#,
        )
        .bind(hunt_id.0)
        .bind(expected)
        .bind(live)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_deleted(&mut self, hunt_id: HuntId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE hunt.hunts
            SET is_deleted = true, live_version = NULL, updated_at = $2
            WHERE hunt_id = $1 AND NOT is_deleted
            "#,
        )
        .bind(hunt_id.0)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_snapshot(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<VersionSnapshot>> {
        let row = sqlx::query_as::<_, PgVersionRow>(
            r#"
            SELECT hunt_id, version, name, description, cover_image,
                   step_order, is_published, updated_at
            FROM hunt.hunt_versions
            WHERE hunt_id = $1 AND version = $2
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Into::into))
    }

    async fn lock_draft(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<VersionSnapshot>> {
        let row = sqlx::query_as::<_, PgVersionRow>(
            r#"
            SELECT hunt_id, version, name, description, cover_image,
                   step_order, is_published, updated_at
            FROM hunt.hunt_versions
            WHERE hunt_id = $1 AND version = $2
            FOR UPDATE
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Into::into))
    }

    async fn insert_snapshot(&mut self, snapshot: &VersionSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hunt.hunt_versions (
                hunt_id, version, name, description, cover_image,
                step_order, is_published, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(snapshot.hunt_id.0)
        .bind(snapshot.version)
        .bind(&snapshot.metadata.name)
        .bind(&snapshot.metadata.description)
        .bind(snapshot.metadata.cover_image.map(|a| a.0))
        .bind(step_ids(&snapshot.step_order))
        .bind(snapshot.is_published)
        .bind(snapshot.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            map_write_err(
                e,
                &format!("snapshot v{} of hunt {}", snapshot.version, snapshot.hunt_id),
            )
        })?;
        Ok(())
    }

    async fn update_draft_metadata(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        metadata: &SnapshotMetadata,
        expected_updated_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE hunt.hunt_versions
            SET name = $3, description = $4, cover_image = $5, updated_at = $7
            WHERE hunt_id = $1
              AND version = $2
              AND NOT is_published
              AND ($6::timestamptz IS NULL OR updated_at = $6)
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .bind(&metadata.name)
        .bind(&metadata.description)
        .bind(metadata.cover_image.map(|a| a.0))
        .bind(expected_updated_at)
        .bind(updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_step_order(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        step_order: &[StepId],
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE hunt.hunt_versions
            SET step_order = $3, updated_at = $4
            WHERE hunt_id = $1 AND version = $2 AND NOT is_published
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .bind(step_ids(step_order))
        .bind(updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_published(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE hunt.hunt_versions
            SET is_published = true, updated_at = $3
            WHERE hunt_id = $1 AND version = $2 AND NOT is_published
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .bind(updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_steps(&mut self, hunt_id: HuntId, version: Version) -> Result<Vec<Step>> {
        let rows = sqlx::query_as::<_, PgStepRow>(
            r#"
            SELECT step_id, hunt_id, version, content, updated_at
            FROM hunt.hunt_steps
            WHERE hunt_id = $1 AND version = $2
            ORDER BY step_id
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| Step::try_from(r).map_err(row_err))
            .collect()
    }

    async fn delete_steps(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        ids: &[StepId],
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM hunt.hunt_steps
            WHERE hunt_id = $1 AND version = $2 AND step_id = ANY($3)
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .bind(step_ids(ids))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected())
    }

    async fn update_step(
        &mut self,
        hunt_id: HuntId,
        version: Version,
        step_id: StepId,
        content: &StepContent,
        expected_updated_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE hunt.hunt_steps
            SET content = $4, updated_at = $6
            WHERE step_id = $3
              AND hunt_id = $1
              AND version = $2
              AND ($5::timestamptz IS NULL OR updated_at = $5)
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .bind(step_id.0)
        .bind(content_json(content)?)
        .bind(expected_updated_at)
        .bind(updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_steps(&mut self, steps: &[Step]) -> Result<()> {
        for step in steps {
            sqlx::query(
                r#"
                INSERT INTO hunt.hunt_steps (step_id, hunt_id, version, content, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(step.step_id.0)
            .bind(step.hunt_id.0)
            .bind(step.version)
            .bind(content_json(&step.content)?)
            .bind(step.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_write_err(e, &format!("step {}", step.step_id)))?;
        }
        Ok(())
    }

    async fn insert_published_record(&mut self, record: &PublishedRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hunt.published_versions (
                hunt_id, version, name, step_count, published_at, published_by
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.hunt_id.0)
        .bind(record.version)
        .bind(&record.name)
        .bind(record.step_count)
        .bind(record.published_at)
        .bind(record.published_by.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            map_write_err(
                e,
                &format!("publish record v{} of hunt {}", record.version, record.hunt_id),
            )
        })?;
        Ok(())
    }

    async fn load_published_record(
        &mut self,
        hunt_id: HuntId,
        version: Version,
    ) -> Result<Option<PublishedRecord>> {
        let row = sqlx::query_as::<_, PgPublishedRow>(
            r#"
            SELECT hunt_id, version, name, step_count, published_at, published_by
            FROM hunt.published_versions
            WHERE hunt_id = $1 AND version = $2
            "#,
        )
        .bind(hunt_id.0)
        .bind(version)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Into::into))
    }

    async fn list_published_records(&mut self, hunt_id: HuntId) -> Result<Vec<PublishedRecord>> {
        let rows = sqlx::query_as::<_, PgPublishedRow>(
            r#"
            SELECT hunt_id, version, name, step_count, published_at, published_by
            FROM hunt.published_versions
            WHERE hunt_id = $1
            ORDER BY version
            "#,
        )
        .bind(hunt_id.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_grant(&mut self, grant: &AccessGrant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hunt.access_grants (
                hunt_id, owner_id, shared_with_id, permission, shared_by, shared_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (hunt_id, shared_with_id) DO UPDATE
            SET permission = EXCLUDED.permission,
                shared_by = EXCLUDED.shared_by,
                shared_at = EXCLUDED.shared_at
            "#,
        )
        .bind(grant.hunt_id.0)
        .bind(grant.owner_id.as_str())
        .bind(grant.shared_with_id.as_str())
        .bind(grant.permission.as_str())
        .bind(grant.shared_by.as_str())
        .bind(grant.shared_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn delete_grant(&mut self, hunt_id: HuntId, shared_with_id: &UserId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM hunt.access_grants WHERE hunt_id = $1 AND shared_with_id = $2",
        )
        .bind(hunt_id.0)
        .bind(shared_with_id.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_grants(&mut self, hunt_id: HuntId) -> Result<Vec<AccessGrant>> {
        let rows = sqlx::query_as::<_, PgGrantRow>(
            r#"
            SELECT hunt_id, owner_id, shared_with_id, permission, shared_by, shared_at
            FROM hunt.access_grants
            WHERE hunt_id = $1
            ORDER BY shared_at, shared_with_id
            "#,
        )
        .bind(hunt_id.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| AccessGrant::try_from(r).map_err(row_err))
            .collect()
    }

    async fn replace_asset_usage(&mut self, hunt_id: HuntId, assets: &[AssetId]) -> Result<()> {
        sqlx::query("DELETE FROM hunt.asset_usage WHERE hunt_id = $1")
            .bind(hunt_id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        if assets.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = assets.iter().map(|a| a.0).collect();
        sqlx::query(
            r#"
            INSERT INTO hunt.asset_usage (hunt_id, asset_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(hunt_id.0)
        .bind(ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }
}
