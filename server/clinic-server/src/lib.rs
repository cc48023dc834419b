//! Clinic Engine server - multi-tenant dental clinic API
//!
//! This library provides the HTTP surface of the clinic engine: tenant
//! resolution, JWT authentication, role based access control and the
//! resource, notification and report endpoints.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use error::*;
pub use server::ClinicServer;

use axum::{middleware::from_fn, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Create the main application router with all routes and middleware
pub fn create_app(server: ClinicServer) -> Router {
    let cors = middleware::create_cors_layer(&server.config.server.allowed_origins);
    let timeout = Duration::from_secs(server.config.server.request_timeout_secs.max(1));

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(from_fn(middleware::request_id_middleware))
                .layer(from_fn(middleware::request_timing_middleware))
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(server)
}
