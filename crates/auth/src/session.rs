use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use quizgate_core::{AccountId, DeviceId, SessionId};

/// One-way hash of a refresh credential: base64(SHA-256(token)).
///
/// This is the only form in which refresh credentials are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshTokenHash(String);

impl RefreshTokenHash {
    pub fn of(token: &str) -> Self {
        Self(STANDARD.encode(Sha256::digest(token.as_bytes())))
    }

    /// Wrap an already-computed hash (e.g. read back from storage).
    pub fn from_stored(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log correlation.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

/// Server record binding a device to its current refresh credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub account_id: AccountId,
    pub token_hash: RefreshTokenHash,
    pub issued_at: DateTime<Utc>,
    pub device_id: DeviceId,
}

impl Session {
    pub fn new(
        account_id: AccountId,
        device_id: DeviceId,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            account_id,
            token_hash,
            issued_at,
            device_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_standard_base64_sha256() {
        // SHA-256("abc")
        let hash = RefreshTokenHash::of("abc");
        assert_eq!(hash.as_str(), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
        assert_eq!(hash.short(), "ungWv48B");
    }

    #[test]
    fn distinct_tokens_hash_differently() {
        assert_ne!(RefreshTokenHash::of("token-a"), RefreshTokenHash::of("token-b"));
    }
}
