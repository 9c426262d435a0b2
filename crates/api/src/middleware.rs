//! Authorization filter.
//!
//! Per request: exempt paths pass through untouched; every other request must
//! carry `Authorization: Bearer <access credential>`, which is resolved to a
//! principal or rejected with 401. No retries happen here.

use axum::{
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use quizgate_auth::{AuthError, Principal};
use quizgate_infra::{TokenError, TokenService};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Paths that bypass authentication. Entries ending in `/` match as prefixes.
pub const EXEMPT_PATHS: &[&str] = &["/health", "/api/v1/account/"];

#[derive(Clone)]
pub struct AuthState {
    pub tokens: TokenService,
}

/// Terminal state of the filter for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Exempt,
    Authenticated(Principal),
    Rejected(AuthError),
}

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.iter().any(|exempt| {
        if exempt.ends_with('/') {
            path.starts_with(exempt)
        } else {
            path == *exempt
        }
    })
}

/// Run the filter state machine without touching the request.
pub async fn evaluate(tokens: &TokenService, path: &str, headers: &HeaderMap) -> Result<FilterOutcome, TokenError> {
    if is_exempt(path) {
        return Ok(FilterOutcome::Exempt);
    }

    let token = match extract_bearer(headers) {
        Ok(token) => token,
        Err(e) => return Ok(FilterOutcome::Rejected(e)),
    };

    match tokens.verify_access(token).await {
        Ok(principal) => Ok(FilterOutcome::Authenticated(principal)),
        Err(TokenError::Auth(e)) => Ok(FilterOutcome::Rejected(e)),
        Err(other) => Err(other),
    }
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    match evaluate(&state.tokens, &path, req.headers()).await {
        Ok(FilterOutcome::Exempt) => next.run(req).await,
        Ok(FilterOutcome::Authenticated(principal)) => {
            req.extensions_mut().insert(PrincipalContext::new(principal));
            next.run(req).await
        }
        Ok(FilterOutcome::Rejected(err)) => {
            tracing::warn!(path = %path, error = err.code(), "request rejected");
            errors::auth_error(err)
        }
        Err(err) => {
            tracing::error!(path = %path, error = %err, "credential verification failed");
            errors::token_error(err)
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    let header = header.to_str().map_err(|_| AuthError::MalformedCredential)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingCredential)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn exempt_paths() {
        assert!(is_exempt("/health"));
        assert!(is_exempt("/api/v1/account/auth"));
        assert!(is_exempt("/api/v1/account/refresh"));
        assert!(!is_exempt("/api/v1/accounts"));
        assert!(!is_exempt("/api/v1/session/me"));
        assert!(!is_exempt("/healthz"));
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Err(AuthError::MissingCredential));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), Err(AuthError::MissingCredential));

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), Err(AuthError::MissingCredential));

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers), Ok("abc.def"));
    }
}
