//! hunt_harness: helpers for tests that need a real Postgres.

pub mod db;

use std::sync::Arc;

use hunt_core::service::HuntServiceImpl;
use hunt_postgres::PgStores;
use sqlx::PgPool;

/// A service wired to Postgres adapters over `pool`.
pub fn pg_service(pool: PgPool) -> HuntServiceImpl {
    PgStores::new(pool).into_service()
}

/// A service plus the asset adapter, for tests that register uploads.
pub fn pg_service_with_assets(
    pool: PgPool,
) -> (
    HuntServiceImpl,
    Arc<hunt_postgres::PgAssets>,
    Arc<hunt_postgres::PgSequenceAllocator>,
) {
    let stores = PgStores::new(pool);
    let assets = Arc::new(stores.assets);
    let sequences = Arc::new(stores.sequences);
    let service = HuntServiceImpl::new(Arc::new(stores.hunts), sequences.clone(), assets.clone());
    (service, assets, sequences)
}
