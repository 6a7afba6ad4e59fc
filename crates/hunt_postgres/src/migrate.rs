//! Schema migrations, embedded at compile time and applied in order.
//!
//! Applied names are recorded in `public.hunt_schema_migrations`; a file is
//! run at most once per database.

use anyhow::{anyhow, Context};
use sqlx::PgPool;

/// `(name, sql)` in application order.
pub const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_hunt_schema.sql",
    include_str!("../migrations/0001_hunt_schema.sql"),
)];

/// Apply every migration not yet recorded.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<usize> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS public.hunt_schema_migrations (
            name        TEXT PRIMARY KEY,
            applied_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| anyhow!(e))
    .context("creating migration ledger")?;

    let mut applied = 0;
    for (name, sql) in MIGRATIONS {
        let done = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM public.hunt_schema_migrations WHERE name = $1)",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(|e| anyhow!(e))?;
        if done {
            continue;
        }

        let mut tx = pool.begin().await.map_err(|e| anyhow!(e))?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("migration {name} failed"))?;
        sqlx::query("INSERT INTO public.hunt_schema_migrations (name) VALUES ($1)")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        tx.commit().await.map_err(|e| anyhow!(e))?;

        tracing::info!(migration = name, "migration applied");
        applied += 1;
    }
    Ok(applied)
}
