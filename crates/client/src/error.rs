#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Terminal: the session is gone and the user has to log in again.
    #[error("re-authentication required")]
    ReauthRequired,

    /// The server rejected the credential or the login (`code` is the server's error code).
    #[error("unauthorized: {code}")]
    Unauthorized { code: String },

    /// The refresh call could not reach a verdict (network, 5xx); credentials are kept.
    #[error("refresh unavailable: {0}")]
    RefreshUnavailable(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ClientError {
    /// Turn a non-success response into an error, keeping the server's error code.
    pub(crate) async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            let code = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|c| c.as_str()).map(str::to_string))
                .unwrap_or_else(|| "unauthorized".to_string());
            return ClientError::Unauthorized { code };
        }
        ClientError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
