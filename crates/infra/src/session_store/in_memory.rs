use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use quizgate_auth::{RefreshTokenHash, Session};
use quizgate_core::{AccountId, DeviceId};

use super::SessionStore;
use crate::StoreError;

/// In-memory session store.
///
/// Intended for tests/dev. A single lock guards the map, so rotation is
/// atomic with respect to lookups.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<(AccountId, DeviceId), Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn rotate(
        &self,
        account_id: AccountId,
        device_id: &DeviceId,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let mut map = self
            .sessions
            .write()
            .map_err(|_| StoreError::poisoned("session store"))?;
        let session = Session::new(account_id, device_id.clone(), token_hash, issued_at);
        map.insert((account_id, device_id.clone()), session.clone());
        Ok(session)
    }

    async fn rotate_if_current(
        &self,
        account_id: AccountId,
        device_id: &DeviceId,
        expected: &RefreshTokenHash,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        let mut map = self
            .sessions
            .write()
            .map_err(|_| StoreError::poisoned("session store"))?;
        let key = (account_id, device_id.clone());
        match map.get(&key) {
            Some(current) if &current.token_hash == expected => {}
            _ => return Ok(None),
        }
        let session = Session::new(account_id, device_id.clone(), token_hash, issued_at);
        map.insert(key, session.clone());
        Ok(Some(session))
    }

    async fn lookup_by_hash(&self, token_hash: &RefreshTokenHash) -> Result<Option<Session>, StoreError> {
        let map = self
            .sessions
            .read()
            .map_err(|_| StoreError::poisoned("session store"))?;
        Ok(map.values().find(|s| &s.token_hash == token_hash).cloned())
    }

    async fn revoke_device(&self, account_id: AccountId, device_id: &DeviceId) -> Result<bool, StoreError> {
        let mut map = self
            .sessions
            .write()
            .map_err(|_| StoreError::poisoned("session store"))?;
        Ok(map.remove(&(account_id, device_id.clone())).is_some())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut map = self
            .sessions
            .write()
            .map_err(|_| StoreError::poisoned("session store"))?;
        let before = map.len();
        map.retain(|_, s| s.issued_at >= cutoff);
        Ok((before - map.len()) as u64)
    }

    async fn sessions_for(&self, account_id: AccountId) -> Result<Vec<Session>, StoreError> {
        let map = self
            .sessions
            .read()
            .map_err(|_| StoreError::poisoned("session store"))?;
        let mut sessions: Vec<Session> = map
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.device_id.as_str().cmp(b.device_id.as_str()));
        Ok(sessions)
    }
}
