//! Hunt versioning core.
//!
//! Draft / publish / live lifecycle for scavenger hunts: a mutable draft
//! snapshot per hunt, immutable published snapshots, and one live pointer.
//! Storage is reached only through the port traits in [`ports`];
//! `hunt_postgres` implements them for PostgreSQL and [`memory`] for tests.

pub mod assets;
pub mod canonical;
pub mod clock;
pub mod clone;
pub mod diff;
pub mod error;
pub mod memory;
pub mod permission;
pub mod ports;
pub mod principal;
pub mod read;
pub mod release;
pub mod save;
pub mod service;
pub mod sharing;
pub mod slug;
pub mod types;
pub mod validate;

pub use error::HuntError;
pub use permission::{AccessContext, Capabilities, Permission, PermissionResolver};
pub use principal::{JwtClaims, Principal};
pub use service::{HuntDetail, HuntService, HuntServiceImpl};
