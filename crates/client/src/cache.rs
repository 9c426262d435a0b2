use std::sync::{PoisonError, RwLock};

use serde::Deserialize;

use quizgate_core::AccountId;

/// Credential pair as returned by the login and refresh endpoints.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "token")]
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "uuid")]
    pub account_id: AccountId,
    pub username: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Current credentials of one client instance.
///
/// Any request path may read it; only login, logout and the refresh
/// coordinator write it.
#[derive(Debug, Default)]
pub struct CredentialCache {
    inner: RwLock<Option<Credentials>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, credentials: Credentials) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials);
    }

    pub fn current(&self) -> Option<Credentials> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn creds(access: &str, refresh: &str) -> Credentials {
        Credentials {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            account_id: AccountId::new(),
            username: "alice".to_string(),
        }
    }

    #[test]
    fn set_current_clear() {
        let cache = CredentialCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.access_token(), None);

        cache.set(creds("a1", "r1"));
        assert_eq!(cache.access_token().as_deref(), Some("a1"));
        assert_eq!(cache.current().unwrap().refresh_token, "r1");

        cache.clear();
        assert!(cache.current().is_none());
    }

    #[test]
    fn debug_hides_tokens() {
        let rendered = format!("{:?}", creds("secret-access", "secret-refresh"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn deserializes_server_shape() {
        let id = AccountId::new();
        let json = serde_json::json!({
            "token": "a", "refresh_token": "r", "uuid": id.to_string(), "username": "bob"
        });
        let c: Credentials = serde_json::from_value(json).unwrap();
        assert_eq!(c.access_token, "a");
        assert_eq!(c.account_id, id);
    }
}
