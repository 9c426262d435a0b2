//! Exempt account endpoints: registration, login and refresh.

use axum::{
    Json, Router,
    extract::{
        Extension, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use quizgate_core::DeviceId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/check_available", get(check_available))
        .route("/auth", post(auth))
        .route("/refresh", post(refresh))
}

pub async fn register(
    Extension(services): Extension<AppServices>,
    body: Result<Json<dto::RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_rejection(e),
    };
    match services.accounts.register(&body.username, &body.password).await {
        Ok(account) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "uuid": account.id.to_string(),
                "username": account.username,
            })),
        )
            .into_response(),
        Err(e) => errors::register_error(e),
    }
}

pub async fn check_available(
    Extension(services): Extension<AppServices>,
    query: Result<Query<dto::CheckAvailableQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => return errors::bad_request(e.body_text()),
    };
    match services.accounts.is_available(&query.username).await {
        Ok(available) => Json(serde_json::json!({ "available": available })).into_response(),
        Err(e) => errors::store_error(e),
    }
}

pub async fn auth(
    Extension(services): Extension<AppServices>,
    body: Result<Json<dto::AuthRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_rejection(e),
    };
    let device_id = match DeviceId::parse(body.device_id) {
        Ok(d) => d,
        Err(e) => return errors::bad_request(e.to_string()),
    };

    match services.tokens.login(&body.username, &body.password, &device_id).await {
        Ok(pair) => Json(dto::AuthResponse::from(pair)).into_response(),
        Err(e) => errors::token_error(e),
    }
}

pub async fn refresh(
    Extension(services): Extension<AppServices>,
    body: Result<Json<dto::RefreshRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_rejection(e),
    };
    let device_id = match DeviceId::parse(body.device_id) {
        Ok(d) => d,
        Err(e) => return errors::bad_request(e.to_string()),
    };

    match services.tokens.refresh(&body.refresh_token, &device_id).await {
        Ok(pair) => Json(dto::AuthResponse::from(pair)).into_response(),
        Err(e) => {
            if let Some(auth) = e.auth() {
                tracing::warn!(device_id = %device_id, error = auth.code(), "refresh rejected");
            }
            errors::token_error(e)
        }
    }
}
