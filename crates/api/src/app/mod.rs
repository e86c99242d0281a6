//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (event store, bus, clock, transfer, ledger service)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use grouppool_infra::{Clock, InMemoryTransfer, SystemClock};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &ApiConfig) -> Router {
    build_app_with(config, Arc::new(SystemClock), Arc::new(InMemoryTransfer::new()))
}

/// Same router as `build_app`, driven by the given clock and paying out
/// through the given transfer.
pub fn build_app_with(
    config: &ApiConfig,
    clock: Arc<dyn Clock>,
    transfer: Arc<InMemoryTransfer>,
) -> Router {
    let services = Arc::new(services::build_services(config, clock, transfer));

    // Ledger routes: require a caller.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(Extension(services))
            .layer(axum::middleware::from_fn(middleware::caller_middleware)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
