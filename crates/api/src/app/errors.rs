use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use quizgate_auth::{AuthError, AuthzError};
use quizgate_infra::{RegisterError, StoreError, TokenError};

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 401 for every authentication failure, with a bearer challenge.
pub fn auth_error(err: AuthError) -> Response {
    let mut res = json_error(StatusCode::UNAUTHORIZED, err.code(), err.to_string());
    res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(r#"Bearer error="invalid_token""#),
    );
    res
}

pub fn token_error(err: TokenError) -> Response {
    match err {
        TokenError::Auth(e) => auth_error(e),
        TokenError::Store(e) => store_error(e),
        TokenError::Issue(e) => {
            tracing::error!(error = %e, "credential issuing failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
        TokenError::Task(msg) => {
            tracing::error!(error = %msg, "background task failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn store_error(err: StoreError) -> Response {
    tracing::error!(error = %err, "store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage unavailable")
}

pub fn register_error(err: RegisterError) -> Response {
    match err {
        RegisterError::UsernameTaken => json_error(StatusCode::CONFLICT, "username_taken", "username is already taken"),
        RegisterError::Invalid(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        RegisterError::Internal(msg) => {
            tracing::error!(error = %msg, "registration failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn authz_error(err: AuthzError) -> Response {
    match err {
        AuthzError::PermissionDenied => json_error(StatusCode::FORBIDDEN, "permission_denied", err.to_string()),
        AuthzError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
    }
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Unreadable or incomplete JSON bodies are validation failures, not 422s.
pub fn json_rejection(err: JsonRejection) -> Response {
    tracing::debug!(error = %err, "rejected request body");
    bad_request(err.body_text())
}
