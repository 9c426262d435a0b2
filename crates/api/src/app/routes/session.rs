use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use quizgate_core::DeviceId;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> Response {
    Json(principal.principal().clone()).into_response()
}

/// Explicit logout of one device for the calling account.
pub async fn revoke_device(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(device_id): Path<String>,
) -> Response {
    let device_id = match DeviceId::parse(device_id) {
        Ok(d) => d,
        Err(e) => return errors::bad_request(e.to_string()),
    };

    match services.tokens.logout(principal.account_id(), &device_id).await {
        Ok(revoked) => {
            tracing::info!(account_id = %principal.account_id(), device_id = %device_id, revoked, "device logged out");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::token_error(e),
    }
}
