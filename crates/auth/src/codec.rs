//! Credential codec: HMAC-SHA512 signed claim sets.
//!
//! Wire format: `base64url(claims_json) "." base64url(hmac)`, both unpadded.
//! The MAC covers the encoded claims *and* the separator, and is checked
//! before anything is decoded, so any single-byte change to a credential
//! fails with [`AuthError::BadSignature`].

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;

use crate::claims::{CredentialClaims, CredentialKind, validate_claims};
use crate::AuthError;

type HmacSha512 = Hmac<Sha512>;

/// Encoded length of a 64-byte HMAC-SHA512 tag (unpadded base64url).
pub const SIGNATURE_LEN: usize = 86;

/// Upper bound on accepted credential size.
pub const MAX_CREDENTIAL_LEN: usize = 8 * 1024;

/// Shared HMAC secret.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, IssueError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(IssueError::EmptyKey);
        }
        Ok(Self(secret))
    }

    fn mac(&self) -> Option<HmacSha512> {
        <HmacSha512 as Mac>::new_from_slice(&self.0).ok()
    }
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Opaque signed bearer credential.
///
/// `Debug` is redacted so credentials never leak through logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// A freshly signed credential together with the claims it carries.
#[derive(Debug, Clone)]
pub struct SignedCredential {
    pub credential: Credential,
    pub claims: CredentialClaims,
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("signing key must not be empty")]
    EmptyKey,

    #[error("signing key rejected by HMAC")]
    InvalidKey,

    #[error("refusing to sign inconsistent claims: {0}")]
    InvalidClaims(AuthError),

    #[error("failed to encode claims: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sign `claims` with `key`.
///
/// Deterministic: identical claims and key always produce the same credential.
pub fn issue(claims: CredentialClaims, key: &SigningKey) -> Result<SignedCredential, IssueError> {
    validate_claims(&claims, claims.issued_at).map_err(IssueError::InvalidClaims)?;

    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let mut signed = String::with_capacity(payload.len() + 1 + SIGNATURE_LEN);
    signed.push_str(&payload);
    signed.push('.');

    let mut mac = key.mac().ok_or(IssueError::InvalidKey)?;
    mac.update(signed.as_bytes());
    signed.push_str(&URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()));

    Ok(SignedCredential {
        credential: Credential(signed),
        claims,
    })
}

/// Verify signature, structure and expiry of `credential` at `now`.
pub fn verify(credential: &str, key: &SigningKey, now: DateTime<Utc>) -> Result<CredentialClaims, AuthError> {
    let bytes = credential.as_bytes();
    if bytes.len() < SIGNATURE_LEN + 2 || bytes.len() > MAX_CREDENTIAL_LEN {
        return Err(AuthError::MalformedCredential);
    }

    let (signed, signature) = bytes.split_at(bytes.len() - SIGNATURE_LEN);
    let tag = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::BadSignature)?;
    let mut mac = key.mac().ok_or(AuthError::BadSignature)?;
    mac.update(signed);
    mac.verify_slice(&tag).map_err(|_| AuthError::BadSignature)?;

    let payload = signed
        .strip_suffix(b".")
        .ok_or(AuthError::MalformedCredential)?;
    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::MalformedCredential)?;
    let claims: CredentialClaims =
        serde_json::from_slice(&json).map_err(|_| AuthError::MalformedCredential)?;

    validate_claims(&claims, now)?;
    Ok(claims)
}

/// Verify `credential` and require it to play the `expected` role.
pub fn verify_kind(
    credential: &str,
    key: &SigningKey,
    expected: CredentialKind,
    now: DateTime<Utc>,
) -> Result<CredentialClaims, AuthError> {
    let claims = verify(credential, key, now)?;
    if claims.kind != expected {
        return Err(AuthError::WrongCredentialKind);
    }
    Ok(claims)
}
