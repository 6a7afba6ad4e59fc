//! hunt_postgres: PostgreSQL adapters for the hunt_core ports.
//!
//! Every adapter shares one `PgPool`. `PgStores` bundles them so a binary
//! can wire `HuntServiceImpl` in one place.

pub mod assets;
pub mod migrate;
pub mod sequences;
pub mod sqlx_types;
pub mod store;

use std::sync::Arc;

use sqlx::PgPool;

use hunt_core::service::HuntServiceImpl;

pub use assets::PgAssets;
pub use migrate::run_migrations;
pub use sequences::PgSequenceAllocator;
pub use store::{PgHuntStore, PgHuntTx};

/// All Postgres port implementations over a single pool.
pub struct PgStores {
    pub hunts: PgHuntStore,
    pub sequences: PgSequenceAllocator,
    pub assets: PgAssets,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            hunts: PgHuntStore::new(pool.clone()),
            sequences: PgSequenceAllocator::new(pool.clone()),
            assets: PgAssets::new(pool),
        }
    }

    /// Consume the bundle into a fully wired service.
    pub fn into_service(self) -> HuntServiceImpl {
        HuntServiceImpl::new(
            Arc::new(self.hunts),
            Arc::new(self.sequences),
            Arc::new(self.assets),
        )
    }
}
