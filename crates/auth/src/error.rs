use thiserror::Error;

/// Authentication failure taxonomy.
///
/// Every variant is surfaced to callers as HTTP 401; the variant only picks
/// the machine-readable code and the log line. None of them carry the raw
/// credential.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,

    #[error("malformed credential")]
    MalformedCredential,

    #[error("credential signature mismatch")]
    BadSignature,

    #[error("credential has expired")]
    Expired,

    #[error("credential presented in the wrong role")]
    WrongCredentialKind,

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("device does not match the session")]
    DeviceMismatch,

    #[error("credential subject no longer exists")]
    UnknownSubject,

    #[error("invalid username or password")]
    InvalidLogin,
}

impl AuthError {
    /// Stable snake_case code used in JSON error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::BadSignature => "bad_signature",
            AuthError::Expired => "expired",
            AuthError::WrongCredentialKind => "wrong_credential_kind",
            AuthError::SessionRevoked => "session_revoked",
            AuthError::DeviceMismatch => "device_mismatch",
            AuthError::UnknownSubject => "unknown_subject",
            AuthError::InvalidLogin => "invalid_login",
        }
    }
}
