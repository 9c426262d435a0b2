use serde::{Deserialize, Serialize};

use quizgate_infra::TokenPair;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckAvailableQuery {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub mode: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub uuid: String,
    pub username: String,
}

impl From<TokenPair> for AuthResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            token: pair.access.credential.into_string(),
            refresh_token: pair.refresh.credential.into_string(),
            uuid: pair.account_id.to_string(),
            username: pair.username,
        }
    }
}
