use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quizgate_core::{AccountId, DeviceId};

use crate::AuthError;

/// Role a credential plays in the token protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Short-lived bearer credential attached to API calls.
    Access,
    /// Long-lived credential exchanged for a new access/refresh pair.
    Refresh,
}

impl core::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CredentialKind::Access => f.write_str("access"),
            CredentialKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Signed claim set shared by access and refresh credentials.
///
/// Access credentials never carry a `device_id`; refresh credentials always do.
/// `jti` makes every issued credential unique, even two issued for the same
/// subject and device within one clock tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Subject account.
    pub sub: AccountId,

    pub jti: Uuid,

    pub kind: CredentialKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl CredentialClaims {
    pub fn access(sub: AccountId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            jti: Uuid::new_v4(),
            kind: CredentialKind::Access,
            device_id: None,
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn refresh(sub: AccountId, device_id: DeviceId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            jti: Uuid::new_v4(),
            kind: CredentialKind::Refresh,
            device_id: Some(device_id),
            issued_at: now,
            expires_at: now + ttl,
        }
    }
}

/// Deterministically validate decoded claims.
///
/// Checks structural consistency first (a structurally wrong claim set is
/// malformed no matter the time), then expiry.
pub fn validate_claims(claims: &CredentialClaims, now: DateTime<Utc>) -> Result<(), AuthError> {
    if claims.expires_at <= claims.issued_at {
        return Err(AuthError::MalformedCredential);
    }
    match (claims.kind, &claims.device_id) {
        (CredentialKind::Access, None) | (CredentialKind::Refresh, Some(_)) => {}
        _ => return Err(AuthError::MalformedCredential),
    }
    if now >= claims.expires_at {
        return Err(AuthError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let claims = CredentialClaims::access(AccountId::new(), now, Duration::minutes(5));

        assert_eq!(validate_claims(&claims, now), Ok(()));
        assert_eq!(
            validate_claims(&claims, now + Duration::minutes(5)),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn access_claims_with_device_are_malformed() {
        let now = Utc::now();
        let mut claims = CredentialClaims::access(AccountId::new(), now, Duration::minutes(5));
        claims.device_id = Some(DeviceId::parse("d1").unwrap());

        assert_eq!(validate_claims(&claims, now), Err(AuthError::MalformedCredential));
    }

    #[test]
    fn inverted_window_is_malformed_even_when_expired() {
        let now = Utc::now();
        let mut claims = CredentialClaims::access(AccountId::new(), now, Duration::minutes(5));
        claims.expires_at = claims.issued_at;

        assert_eq!(
            validate_claims(&claims, now + Duration::days(1)),
            Err(AuthError::MalformedCredential)
        );
    }

    #[test]
    fn refresh_claims_serialize_device_and_kind() {
        let now = Utc::now();
        let claims = CredentialClaims::refresh(
            AccountId::new(),
            DeviceId::parse("d1").unwrap(),
            now,
            Duration::days(3),
        );
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["kind"], "refresh");
        assert_eq!(json["device_id"], "d1");
    }
}
