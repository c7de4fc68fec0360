// src/server/routes.rs
//! Axum router configuration for the SatisPress server

use crate::server::ServerState;
use crate::server::handlers::{index, packages};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the main application router
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/satispress/packages.json", get(index::packages_json))
        .route(
            "/satispress/:package_type/:slug/:version",
            get(packages::download_release),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
