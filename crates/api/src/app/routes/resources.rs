use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    response::{IntoResponse, Response},
};

use quizgate_auth::Mode;
use quizgate_core::ResourceId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

/// 200 when the caller may use `mode` on the resource, 403 when not, 404 when
/// the resource does not resolve.
pub async fn check_access(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(resource_id): Path<String>,
    query: Result<Query<dto::AccessQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => return errors::bad_request(e.body_text()),
    };
    let resource: ResourceId = match resource_id.parse() {
        Ok(r) => r,
        Err(e) => return errors::bad_request(format!("{e}")),
    };
    let mode = match Mode::parse(&query.mode) {
        Ok(m) => m,
        Err(e) => return errors::bad_request(e.to_string()),
    };

    match authz::authorize_resource(&services.policy, &principal, resource, mode) {
        Ok(()) => Json(serde_json::json!({
            "resource": resource.to_string(),
            "mode": mode.as_str(),
            "granted": true,
        }))
        .into_response(),
        Err(e) => errors::authz_error(e),
    }
}
