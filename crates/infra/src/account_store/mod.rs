//! Account storage and registration.

use std::sync::Arc;

use tracing::instrument;

use quizgate_auth::account::{self, AccountError};
use quizgate_auth::{Account, Authority};
use quizgate_core::{AccountId, DomainError};

use crate::StoreError;

mod in_memory;
mod postgres;

pub use in_memory::InMemoryAccountStore;
pub use postgres::PostgresAccountStore;

/// Persistent account storage. Usernames are unique and case-sensitive.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; fails with [`StoreError::Conflict`] if the
    /// username is taken.
    async fn insert(&self, account: Account) -> Result<Account, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    /// Replace the account's authorities. Returns `false` if no such account.
    async fn set_authorities(&self, id: AccountId, authorities: Vec<Authority>) -> Result<bool, StoreError>;
}

#[async_trait::async_trait]
impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    async fn insert(&self, account: Account) -> Result<Account, StoreError> {
        (**self).insert(account).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        (**self).find_by_username(username).await
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        (**self).exists_by_username(username).await
    }

    async fn set_authorities(&self, id: AccountId, authorities: Vec<Authority>) -> Result<bool, StoreError> {
        (**self).set_authorities(id, authorities).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("username is already taken")]
    UsernameTaken,

    #[error(transparent)]
    Invalid(DomainError),

    #[error("registration failed: {0}")]
    Internal(String),
}

impl From<StoreError> for RegisterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => RegisterError::UsernameTaken,
            other => RegisterError::Internal(other.to_string()),
        }
    }
}

/// Registration and availability checks on top of an [`AccountStore`].
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    #[instrument(skip(self, password), err)]
    pub async fn register(&self, username: &str, password: &str) -> Result<Account, RegisterError> {
        account::validate_username(username).map_err(RegisterError::Invalid)?;
        account::validate_password(password).map_err(RegisterError::Invalid)?;
        if self.accounts.exists_by_username(username).await? {
            return Err(RegisterError::UsernameTaken);
        }

        let (username, password) = (username.to_string(), password.to_string());
        let account = tokio::task::spawn_blocking(move || Account::register(&username, &password))
            .await
            .map_err(|e| RegisterError::Internal(e.to_string()))?
            .map_err(|e| match e {
                AccountError::Invalid(d) => RegisterError::Invalid(d),
                AccountError::Hashing(msg) => RegisterError::Internal(msg),
            })?;

        let account = self.accounts.insert(account).await?;
        tracing::info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    pub async fn is_available(&self, username: &str) -> Result<bool, StoreError> {
        Ok(!self.accounts.exists_by_username(username).await?)
    }
}

impl core::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountService").finish_non_exhaustive()
    }
}
