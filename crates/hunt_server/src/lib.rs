//! hunt_server: REST surface over `hunt_core::HuntService`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
