use std::time::Duration;

use quizgate_core::DeviceId;

use crate::error::ClientError;

/// How long a request waits for someone else's refresh before giving up.
pub const DEFAULT_REFRESH_WAIT: Duration = Duration::from_secs(5);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8080` (no trailing slash needed).
    pub base_url: String,
    pub device_id: DeviceId,
    pub refresh_wait_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            device_id,
            refresh_wait_timeout: DEFAULT_REFRESH_WAIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_refresh_wait_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_wait_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of this device's session; the device id is one percent-encoded segment.
    pub(crate) fn device_session_url(&self) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Network(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Network("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "session", "devices", self.device_id.as_str()]);
        Ok(url)
    }
}
