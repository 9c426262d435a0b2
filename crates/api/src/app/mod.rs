//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and service construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// The auth middleware wraps every route; it lets exempt paths through and
/// authenticates everything else.
pub fn build_app(services: AppServices) -> Router {
    let auth_state = middleware::AuthState {
        tokens: services.tokens.clone(),
    };

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1/account", routes::account::router())
        .nest("/api/v1", routes::router())
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            )),
        )
}
