//! Router construction for the hunt server.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, post, put},
    Extension, Router,
};
use hunt_core::service::HuntService;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};

/// Build the full axum router with all routes and middleware.
pub fn build_router(service: Arc<dyn HuntService>, jwt_config: JwtConfig) -> Router {
    // Editor routes require a bearer token
    let protected = Router::new()
        .route("/hunts", post(handlers::hunts::create_hunt))
        .route(
            "/hunts/:id",
            get(handlers::hunts::get_hunt)
                .put(handlers::hunts::save_hunt)
                .delete(handlers::hunts::delete_hunt),
        )
        .route("/hunts/:id/clone", post(handlers::hunts::clone_hunt))
        // Version lifecycle
        .route("/hunts/:id/publish", post(handlers::versions::publish))
        .route("/hunts/:id/release", post(handlers::versions::release))
        .route("/hunts/:id/offline", post(handlers::versions::take_offline))
        .route("/hunts/:id/versions", get(handlers::versions::list_versions))
        .route(
            "/hunts/:id/versions/:version",
            get(handlers::versions::get_version),
        )
        // Sharing
        .route("/hunts/:id/access", get(handlers::access::get_access))
        .route("/hunts/:id/grants", get(handlers::access::list_grants))
        .route(
            "/hunts/:id/grants/:user",
            put(handlers::access::share_hunt).delete(handlers::access::revoke_access),
        )
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    // Public routes (no auth)
    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/play/:slug", get(handlers::hunts::play));

    public
        .merge(protected)
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
}
