//! Asset ownership checks against `hunt.assets`.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use hunt_core::error::HuntError;
use hunt_core::ports::{AssetValidator, Counter, Result, SequenceAllocator};
use hunt_core::types::{AssetId, UserId};

pub struct PgAssets {
    pool: PgPool,
}

impl PgAssets {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an uploaded asset. Upload transport and storage live elsewhere;
    /// only ownership is tracked here.
    pub async fn register(
        &self,
        sequences: &dyn SequenceAllocator,
        owner: &UserId,
        storage_key: &str,
    ) -> Result<AssetId> {
        let asset_id = AssetId(sequences.next(Counter::AssetId).await?);
        sqlx::query(
            "INSERT INTO hunt.assets (asset_id, owner_id, storage_key) VALUES ($1, $2, $3)",
        )
        .bind(asset_id.0)
        .bind(owner.as_str())
        .bind(storage_key)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(asset_id)
    }
}

#[async_trait]
impl AssetValidator for PgAssets {
    async fn validate_or_throw(&self, assets: &[AssetId], user_id: &UserId) -> Result<()> {
        if assets.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = assets.iter().map(|a| a.0).collect();
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT asset_id, owner_id FROM hunt.assets WHERE asset_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        for asset in assets {
            match rows.iter().find(|(id, _)| *id == asset.0) {
                None => return Err(HuntError::NotFound(format!("asset {asset} not found"))),
                Some((_, owner)) if owner != user_id.as_str() => {
                    return Err(HuntError::Forbidden(format!(
                        "asset {asset} belongs to another user"
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
