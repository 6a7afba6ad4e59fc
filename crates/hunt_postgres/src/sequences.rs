//! Durable id counters backed by `hunt.counters`.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use hunt_core::ports::{Counter, Result, SequenceAllocator};

/// Upsert-and-increment on its own connection, outside any caller
/// transaction. A value handed out is consumed even if the caller later
/// rolls back, so ids are never reused.
pub struct PgSequenceAllocator {
    pool: PgPool,
}

impl PgSequenceAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reserve `n` values in one statement and return the last one.
    async fn bump(&self, counter: Counter, n: i64) -> Result<i64> {
        let last = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO hunt.counters (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
            SET value = hunt.counters.value + $2
            RETURNING value
            "#,
        )
        .bind(counter.as_str())
        .bind(n)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(last)
    }
}

#[async_trait]
impl SequenceAllocator for PgSequenceAllocator {
    async fn next(&self, counter: Counter) -> Result<i64> {
        self.bump(counter, 1).await
    }

    async fn next_n(&self, counter: Counter, n: usize) -> Result<Vec<i64>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let count = i64::try_from(n).map_err(|e| anyhow!(e))?;
        let last = self.bump(counter, count).await?;
        Ok(((last - count + 1)..=last).collect())
    }
}
