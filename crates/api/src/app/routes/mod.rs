use axum::{
    Router,
    routing::{delete, get},
};

pub mod account;
pub mod resources;
pub mod session;
pub mod system;

/// Router for all authenticated endpoints (mounted under `/api/v1`).
pub fn router() -> Router {
    Router::new()
        .route("/session/me", get(session::me))
        .route("/session/devices/:device_id", delete(session::revoke_device))
        .route("/resources/:resource_id/access", get(resources::check_access))
}
