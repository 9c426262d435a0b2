use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::cache::{CredentialCache, Credentials};
use crate::config::ClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::error::ClientError;
use crate::transport::{HttpRefreshTransport, RefreshTransport};

/// Authenticated client for one device.
///
/// Every protected call attaches the cached access credential. A 401 goes
/// through the [`RefreshCoordinator`] and the call is retried once.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::build(config, None::<fn()>)
    }

    /// Like [`ApiClient::new`]; `hook` runs once when the session can no
    /// longer be refreshed.
    pub fn with_reauth_hook(config: ClientConfig, hook: impl Fn() + Send + Sync + 'static) -> Result<Self, ClientError> {
        Self::build(config, Some(hook))
    }

    fn build<F>(config: ClientConfig, hook: Option<F>) -> Result<Self, ClientError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let cache = Arc::new(CredentialCache::new());
        let transport: Arc<dyn RefreshTransport> = Arc::new(HttpRefreshTransport::new(http.clone(), &config.base_url));
        let coordinator = match hook {
            Some(hook) => RefreshCoordinator::with_reauth_hook(
                cache,
                transport,
                config.device_id.clone(),
                config.refresh_wait_timeout,
                hook,
            ),
            None => RefreshCoordinator::new(cache, transport, config.device_id.clone(), config.refresh_wait_timeout),
        };

        Ok(Self {
            http,
            config,
            coordinator,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialCache {
        self.coordinator.cache()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials, ClientError> {
        let resp = self
            .http
            .post(self.config.url("/api/v1/account/auth"))
            .json(&json!({
                "username": username,
                "password": password,
                "device_id": self.config.device_id,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::from_response(resp).await);
        }
        let credentials: Credentials = resp.json().await?;
        self.coordinator.install(credentials.clone());
        tracing::info!(account_id = %credentials.account_id, device_id = %self.config.device_id, "logged in");
        Ok(credentials)
    }

    /// Revoke this device's session server-side and drop the local credentials.
    ///
    /// The cache is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = match self.config.device_session_url() {
            Ok(url) => self
                .execute(|token| self.http.delete(url.clone()).bearer_auth(token))
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        self.credentials().clear();
        result
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.config.url(path);
        let resp = self.execute(|token| self.http.get(&url).bearer_auth(token)).await?;
        Ok(resp.json().await?)
    }

    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.url(path);
        let resp = self
            .execute(|token| self.http.request(method.clone(), &url).bearer_auth(token).json(body))
            .await?;
        Ok(resp.json().await?)
    }

    /// Send with the current access credential; on 401 recover and retry once.
    async fn execute<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.credentials().access_token().ok_or(ClientError::ReauthRequired)?;
        let resp = build(&token).send().await?;

        let resp = if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(device_id = %self.config.device_id, "access credential rejected");
            let fresh = self.coordinator.recover(&token).await?;
            build(&fresh).send().await?
        } else {
            resp
        };

        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(ClientError::from_response(resp).await)
        }
    }
}
