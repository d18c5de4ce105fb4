//! API Module
//!
//! HTTP API layer for the upload service.

pub mod deploy;
pub mod error;
pub mod health;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::DeployService;

/// Create the main API router with all endpoints
pub fn create_router(service: Arc<DeployService>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/deploy", post(deploy::deploy))
        .route("/status", get(deploy::status))
        .with_state(service)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
