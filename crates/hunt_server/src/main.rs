//! hunt_server: standalone REST server for hunt authoring and play.
//!
//! Configuration is read from the environment (and `.env`); see
//! [`hunt_server::config`].

use std::sync::Arc;

use anyhow::Context;
use hunt_core::service::HuntService;
use hunt_postgres::{run_migrations, PgStores};
use hunt_server::config::ServerConfig;
use hunt_server::middleware::jwt::JwtConfig;
use hunt_server::router::build_router;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hunt_server=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    tracing::info!("Connected to database");

    if config.run_migrations {
        let applied = run_migrations(&pool).await?;
        tracing::info!(applied, "schema up to date");
    }

    let service: Arc<dyn HuntService> = Arc::new(PgStores::new(pool).into_service());
    let jwt_config = JwtConfig::from_secret(config.jwt_secret.as_bytes());
    let app = build_router(service, jwt_config);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("hunt_server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
