use std::collections::HashMap;
use std::sync::RwLock;

use quizgate_auth::{Account, Authority};
use quizgate_core::AccountId;

use super::AccountStore;
use crate::StoreError;

/// In-memory account store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<Account, StoreError> {
        let mut map = self
            .accounts
            .write()
            .map_err(|_| StoreError::poisoned("account store"))?;
        if map.values().any(|a| a.username == account.username) {
            return Err(StoreError::Conflict(format!("username '{}' exists", account.username)));
        }
        map.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let map = self
            .accounts
            .read()
            .map_err(|_| StoreError::poisoned("account store"))?;
        Ok(map.values().find(|a| a.username == username).cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let map = self
            .accounts
            .read()
            .map_err(|_| StoreError::poisoned("account store"))?;
        Ok(map.get(&id).cloned())
    }

    async fn set_authorities(&self, id: AccountId, authorities: Vec<Authority>) -> Result<bool, StoreError> {
        let mut map = self
            .accounts
            .write()
            .map_err(|_| StoreError::poisoned("account store"))?;
        match map.get_mut(&id) {
            Some(account) => {
                account.authorities = authorities;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
