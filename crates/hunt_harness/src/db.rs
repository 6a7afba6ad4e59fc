//! Isolated test database helpers.
//!
//! Each test creates a temporary database via CREATE DATABASE, applies the
//! hunt schema into it, and drops it on cleanup.

use std::str::FromStr;

use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};

/// Holds the test database pool, name, and admin connection for cleanup.
pub struct IsolatedDb {
    /// Pool connected to the isolated test database.
    pub pool: PgPool,
    /// Name of the temporary database.
    pub dbname: String,
    /// Admin pool connected to the control database (for CREATE/DROP).
    admin: PgPool,
}

/// Create an isolated test database, apply the hunt schema, and return handles.
///
/// `admin_url` should point to a database that allows CREATE/DROP DATABASE
/// (typically `postgresql:///postgres`).
pub async fn isolated_db(admin_url: &str) -> IsolatedDb {
    let dbname = format!("hunt_test_{}", uuid::Uuid::new_v4().simple());

    let admin_opts = PgConnectOptions::from_str(admin_url).expect("admin_url parse failed");
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(admin_opts)
        .await
        .expect("admin connect failed");

    sqlx::query(&format!(r#"CREATE DATABASE "{}""#, dbname))
        .execute(&admin)
        .await
        .expect("CREATE DATABASE failed");

    let test_opts = PgConnectOptions::from_str(admin_url)
        .expect("admin_url parse failed")
        .database(&dbname);

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect_with(test_opts)
        .await
        .expect("test db connect failed");

    let applied = hunt_postgres::run_migrations(&pool)
        .await
        .unwrap_or_else(|e| panic!("migrations failed on {dbname}: {e:#}"));
    tracing::debug!(dbname, applied, "isolated database ready");

    IsolatedDb {
        pool,
        dbname,
        admin,
    }
}

/// Drop the isolated test database. Call this in cleanup, even on failure.
pub async fn drop_db(iso: IsolatedDb) {
    // Close the test pool first so connections don't block the DROP.
    iso.pool.close().await;

    // Postgres 13+ supports FORCE to drop even if connections linger.
    let drop_sql = format!(r#"DROP DATABASE IF EXISTS "{}" WITH (FORCE)"#, iso.dbname);
    let _ = sqlx::query(&drop_sql).execute(&iso.admin).await;

    iso.admin.close().await;
}
