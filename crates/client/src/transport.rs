use async_trait::async_trait;
use serde_json::json;

use quizgate_core::DeviceId;

use crate::cache::Credentials;
use crate::error::ClientError;

/// The one network call the coordinator makes: exchange a refresh credential.
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    async fn refresh(&self, refresh_token: &str, device_id: &DeviceId) -> Result<Credentials, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpRefreshTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpRefreshTransport {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            url: format!("{}/api/v1/account/refresh", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl RefreshTransport for HttpRefreshTransport {
    async fn refresh(&self, refresh_token: &str, device_id: &DeviceId) -> Result<Credentials, ClientError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&json!({ "refresh_token": refresh_token, "device_id": device_id }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::from_response(resp).await);
        }
        Ok(resp.json().await?)
    }
}
