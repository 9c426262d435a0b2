//! Session storage: one live refresh-credential hash per (account, device).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use quizgate_auth::{RefreshTokenHash, Session};
use quizgate_core::{AccountId, DeviceId};

use crate::StoreError;

mod in_memory;
mod postgres;

pub use in_memory::InMemorySessionStore;
pub use postgres::PostgresSessionStore;

/// Persistent session storage.
///
/// Implementations must keep at most one session per `(account_id, device_id)`
/// at every point in time observable by `lookup_by_hash`.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Atomically replace every session of `(account_id, device_id)` with a
    /// new one holding `token_hash`.
    async fn rotate(
        &self,
        account_id: AccountId,
        device_id: &DeviceId,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Result<Session, StoreError>;

    /// Like [`SessionStore::rotate`], but only if the device's current
    /// session still holds `expected`. Returns `None` when it does not (the
    /// credential was already rotated or revoked).
    async fn rotate_if_current(
        &self,
        account_id: AccountId,
        device_id: &DeviceId,
        expected: &RefreshTokenHash,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError>;

    async fn lookup_by_hash(&self, token_hash: &RefreshTokenHash) -> Result<Option<Session>, StoreError>;

    /// Remove the device's session. Returns whether one existed.
    async fn revoke_device(&self, account_id: AccountId, device_id: &DeviceId) -> Result<bool, StoreError>;

    /// Delete sessions issued before `cutoff`; returns how many were removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn sessions_for(&self, account_id: AccountId) -> Result<Vec<Session>, StoreError>;
}

#[async_trait::async_trait]
impl<S> SessionStore for Arc<S>
where
    S: SessionStore + ?Sized,
{
    async fn rotate(
        &self,
        account_id: AccountId,
        device_id: &DeviceId,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        (**self).rotate(account_id, device_id, token_hash, issued_at).await
    }

    async fn rotate_if_current(
        &self,
        account_id: AccountId,
        device_id: &DeviceId,
        expected: &RefreshTokenHash,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        (**self)
            .rotate_if_current(account_id, device_id, expected, token_hash, issued_at)
            .await
    }

    async fn lookup_by_hash(&self, token_hash: &RefreshTokenHash) -> Result<Option<Session>, StoreError> {
        (**self).lookup_by_hash(token_hash).await
    }

    async fn revoke_device(&self, account_id: AccountId, device_id: &DeviceId) -> Result<bool, StoreError> {
        (**self).revoke_device(account_id, device_id).await
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        (**self).purge_older_than(cutoff).await
    }

    async fn sessions_for(&self, account_id: AccountId) -> Result<Vec<Session>, StoreError> {
        (**self).sessions_for(account_id).await
    }
}
