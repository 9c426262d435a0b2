//! Accounts and password handling.

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use thiserror::Error;

use quizgate_core::{AccountId, DomainError};

use crate::{Authority, Principal};

pub const MAX_USERNAME_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Registered account.
///
/// Usernames compare case-sensitively. The password is only ever held as an
/// Argon2id PHC string.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    password_hash: String,
    pub authorities: Vec<Authority>,
}

impl Account {
    /// Validate input and create a new account holding `ROLE_USER`.
    pub fn register(username: &str, password: &str) -> Result<Self, AccountError> {
        validate_username(username)?;
        validate_password(password)?;
        Ok(Self {
            id: AccountId::new(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            authorities: vec![Authority::USER],
        })
    }

    /// Rehydrate an account from storage.
    pub fn from_parts(
        id: AccountId,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        authorities: Vec<Authority>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: password_hash.into(),
            authorities,
        }
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn with_authority(mut self, authority: Authority) -> Self {
        if !self.authorities.contains(&authority) {
            self.authorities.push(authority);
        }
        self
    }

    /// Constant-time password check. A corrupt stored hash never matches.
    pub fn verify_password(&self, password: &str) -> bool {
        verify_against(&self.password_hash, password)
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.username.clone(), self.authorities.clone())
    }
}

impl core::fmt::Debug for Account {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("authorities", &self.authorities)
            .finish_non_exhaustive()
    }
}

pub fn validate_username(username: &str) -> Result<(), DomainError> {
    if username.trim().is_empty() {
        return Err(DomainError::validation("username must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

/// Run a full password verification against a throwaway hash.
///
/// Login calls this for unknown usernames so both failure paths cost the same.
pub fn verify_dummy_password(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    if let Some(hash) = DUMMY.get_or_init(|| hash_password("quizgate-dummy-password").ok()) {
        let _ = verify_against(hash, password);
    }
}

fn verify_against(phc: &str, password: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
