//! Token service: issues, verifies and rotates credentials.
//!
//! Refresh protocol: verify the refresh credential, resolve its live session,
//! issue a new access/refresh pair, then swap the session's hash only if it
//! still holds the presented one. A second use of the same refresh credential
//! therefore fails with `SessionRevoked`, even when two uses race.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use quizgate_auth::account::verify_dummy_password;
use quizgate_auth::codec::{self, IssueError, SignedCredential, SigningKey};
use quizgate_auth::{Account, AuthError, CredentialClaims, CredentialKind, Principal, RefreshTokenHash, Session};
use quizgate_core::{AccountId, DeviceId};

use crate::{AccountStore, AuthConfig, Clock, SessionStore, StoreError, SystemClock};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Issue(#[from] IssueError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl TokenError {
    pub fn auth(&self) -> Option<AuthError> {
        match self {
            TokenError::Auth(e) => Some(*e),
            _ => None,
        }
    }
}

/// Access and refresh credentials handed to a client after login or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SignedCredential,
    pub refresh: SignedCredential,
    pub account_id: AccountId,
    pub username: String,
}

#[derive(Clone)]
pub struct TokenService {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    key: SigningKey,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

fn to_chrono(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

impl TokenService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        key: SigningKey,
        access_ttl: std::time::Duration,
        refresh_ttl: std::time::Duration,
    ) -> Self {
        Self {
            accounts,
            sessions,
            key,
            access_ttl: to_chrono(access_ttl),
            refresh_ttl: to_chrono(refresh_ttl),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(
        config: &AuthConfig,
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, TokenError> {
        let key = SigningKey::new(config.secret.clone())?;
        Ok(Self::new(accounts, sessions, key, config.access_ttl, config.refresh_ttl))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn issue_access_token(&self, account: &Account) -> Result<SignedCredential, TokenError> {
        let claims = CredentialClaims::access(account.id, self.clock.now(), self.access_ttl);
        Ok(codec::issue(claims, &self.key)?)
    }

    /// Sign a refresh credential for `device_id`. The caller must rotate the
    /// device's session to its hash before handing it out.
    pub fn issue_refresh_token(&self, account: &Account, device_id: &DeviceId) -> Result<SignedCredential, TokenError> {
        let claims = CredentialClaims::refresh(account.id, device_id.clone(), self.clock.now(), self.refresh_ttl);
        Ok(codec::issue(claims, &self.key)?)
    }

    /// Resolve an access credential to the current principal.
    pub async fn verify_access(&self, token: &str) -> Result<Principal, TokenError> {
        let claims = codec::verify_kind(token, &self.key, CredentialKind::Access, self.clock.now())?;
        match self.accounts.find_by_id(claims.sub).await? {
            Some(account) => Ok(account.principal()),
            None => Err(AuthError::UnknownSubject.into()),
        }
    }

    /// Verify a refresh credential and return the live session it belongs to.
    pub async fn verify_refresh(&self, token: &str) -> Result<Session, TokenError> {
        let claims = codec::verify_kind(token, &self.key, CredentialKind::Refresh, self.clock.now())?;
        let hash = RefreshTokenHash::of(token);

        let session = self
            .sessions
            .lookup_by_hash(&hash)
            .await?
            .ok_or(AuthError::SessionRevoked)?;

        if session.account_id != claims.sub || claims.device_id.as_ref() != Some(&session.device_id) {
            tracing::warn!(token = %hash.short(), "refresh claims disagree with stored session");
            return Err(AuthError::SessionRevoked.into());
        }
        Ok(session)
    }

    /// Authenticate with username/password and open a session for `device_id`.
    #[instrument(skip(self, password), fields(device_id = %device_id), err)]
    pub async fn login(&self, username: &str, password: &str, device_id: &DeviceId) -> Result<TokenPair, TokenError> {
        let account = self.accounts.find_by_username(username).await?;

        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || match account {
            Some(account) if account.verify_password(&password) => Some(account),
            Some(_) => None,
            None => {
                verify_dummy_password(&password);
                None
            }
        })
        .await
        .map_err(|e| TokenError::Task(e.to_string()))?;

        let account = verified.ok_or(AuthError::InvalidLogin)?;
        let pair = self.issue_pair(&account, device_id)?;
        let session = self
            .sessions
            .rotate(
                account.id,
                device_id,
                RefreshTokenHash::of(pair.refresh.credential.as_str()),
                pair.refresh.claims.issued_at,
            )
            .await?;

        tracing::info!(
            account_id = %account.id,
            session_id = %session.id,
            "login succeeded"
        );
        Ok(pair)
    }

    /// Exchange a refresh credential for a new pair, rotating the session.
    #[instrument(skip(self, refresh_token), fields(device_id = %device_id), err)]
    pub async fn refresh(&self, refresh_token: &str, device_id: &DeviceId) -> Result<TokenPair, TokenError> {
        let session = self.verify_refresh(refresh_token).await?;
        if &session.device_id != device_id {
            tracing::warn!(
                account_id = %session.account_id,
                session_device = %session.device_id,
                "refresh presented from a different device"
            );
            return Err(AuthError::DeviceMismatch.into());
        }

        let account = self
            .accounts
            .find_by_id(session.account_id)
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        let pair = self.issue_pair(&account, device_id)?;
        let new_hash = RefreshTokenHash::of(pair.refresh.credential.as_str());
        tracing::debug!(
            account_id = %account.id,
            previous = %session.token_hash.short(),
            next = %new_hash.short(),
            "rotating session"
        );

        self.sessions
            .rotate_if_current(
                account.id,
                device_id,
                &session.token_hash,
                new_hash,
                pair.refresh.claims.issued_at,
            )
            .await?
            .ok_or(AuthError::SessionRevoked)?;

        Ok(pair)
    }

    /// Revoke the session of `device_id`. Returns whether one existed.
    #[instrument(skip(self), fields(account_id = %account_id, device_id = %device_id), err)]
    pub async fn logout(&self, account_id: AccountId, device_id: &DeviceId) -> Result<bool, TokenError> {
        Ok(self.sessions.revoke_device(account_id, device_id).await?)
    }

    /// Delete sessions whose refresh credential can no longer be valid.
    pub async fn purge_expired_sessions(&self) -> Result<u64, TokenError> {
        let cutoff = self.clock.now() - self.refresh_ttl;
        Ok(self.sessions.purge_older_than(cutoff).await?)
    }

    fn issue_pair(&self, account: &Account, device_id: &DeviceId) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue_access_token(account)?,
            refresh: self.issue_refresh_token(account, device_id)?,
            account_id: account.id,
            username: account.username.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;
    use crate::{InMemoryAccountStore, InMemorySessionStore, ManualClock};

    struct Harness {
        service: TokenService,
        sessions: Arc<InMemorySessionStore>,
        accounts: Arc<InMemoryAccountStore>,
        clock: Arc<ManualClock>,
        account: Account,
    }

    async fn harness() -> Harness {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let account = accounts
            .insert(Account::register("alice", "password123").unwrap())
            .await
            .unwrap();
        let service = TokenService::new(
            accounts.clone(),
            sessions.clone(),
            SigningKey::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap(),
            std::time::Duration::from_secs(300),
            std::time::Duration::from_secs(259_200),
        )
        .with_clock(clock.clone());
        Harness {
            service,
            sessions,
            accounts,
            clock,
            account,
        }
    }

    fn d(raw: &str) -> DeviceId {
        DeviceId::parse(raw).unwrap()
    }

    fn auth_err(result: Result<impl core::fmt::Debug, TokenError>) -> Option<AuthError> {
        result.err().and_then(|e| e.auth())
    }

    #[tokio::test]
    async fn login_refresh_replay_scenario() {
        let h = harness().await;
        let v1 = h.service.login("alice", "password123", &d("d1")).await.unwrap();
        assert_eq!(h.sessions.sessions_for(h.account.id).await.unwrap().len(), 1);

        let v2 = h
            .service
            .refresh(v1.refresh.credential.as_str(), &d("d1"))
            .await
            .unwrap();
        assert_ne!(v1.refresh.credential, v2.refresh.credential);
        assert_eq!(h.sessions.sessions_for(h.account.id).await.unwrap().len(), 1);

        assert_eq!(
            auth_err(h.service.refresh(v1.refresh.credential.as_str(), &d("d1")).await),
            Some(AuthError::SessionRevoked)
        );
        assert!(h.service.verify_refresh(v2.refresh.credential.as_str()).await.is_ok());
    }

    #[tokio::test]
    async fn verify_refresh_after_rotate_succeeds_then_is_revoked() {
        let h = harness().await;
        let device = d("d1");
        let refresh = h.service.issue_refresh_token(&h.account, &device).unwrap();
        let hash = RefreshTokenHash::of(refresh.credential.as_str());
        h.sessions
            .rotate(h.account.id, &device, hash, refresh.claims.issued_at)
            .await
            .unwrap();

        let session = h.service.verify_refresh(refresh.credential.as_str()).await.unwrap();
        assert_eq!(session.device_id, device);

        h.service.refresh(refresh.credential.as_str(), &device).await.unwrap();
        assert_eq!(
            auth_err(h.service.verify_refresh(refresh.credential.as_str()).await),
            Some(AuthError::SessionRevoked)
        );
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let h = harness().await;

        assert_eq!(
            auth_err(h.service.login("alice", "nope-nope", &d("d1")).await),
            Some(AuthError::InvalidLogin)
        );
        assert_eq!(
            auth_err(h.service.login("mallory", "password123", &d("d1")).await),
            Some(AuthError::InvalidLogin)
        );
    }

    #[tokio::test]
    async fn access_token_resolves_principal_until_expiry() {
        let h = harness().await;
        let pair = h.service.login("alice", "password123", &d("d1")).await.unwrap();

        let principal = h.service.verify_access(pair.access.credential.as_str()).await.unwrap();
        assert_eq!(principal.username, "alice");

        h.clock.advance(Duration::minutes(5));
        assert_eq!(
            auth_err(h.service.verify_access(pair.access.credential.as_str()).await),
            Some(AuthError::Expired)
        );
    }

    #[tokio::test]
    async fn credentials_are_not_interchangeable() {
        let h = harness().await;
        let pair = h.service.login("alice", "password123", &d("d1")).await.unwrap();

        assert_eq!(
            auth_err(h.service.verify_access(pair.refresh.credential.as_str()).await),
            Some(AuthError::WrongCredentialKind)
        );
        assert_eq!(
            auth_err(h.service.refresh(pair.access.credential.as_str(), &d("d1")).await),
            Some(AuthError::WrongCredentialKind)
        );
    }

    #[tokio::test]
    async fn refresh_from_other_device_is_rejected() {
        let h = harness().await;
        let pair = h.service.login("alice", "password123", &d("d1")).await.unwrap();

        assert_eq!(
            auth_err(h.service.refresh(pair.refresh.credential.as_str(), &d("d2")).await),
            Some(AuthError::DeviceMismatch)
        );
        // Session is untouched by the failed attempt.
        assert!(h.service.refresh(pair.refresh.credential.as_str(), &d("d1")).await.is_ok());
    }

    #[tokio::test]
    async fn logout_revokes_only_that_device() {
        let h = harness().await;
        let phone = h.service.login("alice", "password123", &d("phone")).await.unwrap();
        let laptop = h.service.login("alice", "password123", &d("laptop")).await.unwrap();

        assert!(h.service.logout(h.account.id, &d("phone")).await.unwrap());
        assert_eq!(
            auth_err(h.service.refresh(phone.refresh.credential.as_str(), &d("phone")).await),
            Some(AuthError::SessionRevoked)
        );
        assert!(h.service.refresh(laptop.refresh.credential.as_str(), &d("laptop")).await.is_ok());
    }

    #[tokio::test]
    async fn relogin_on_same_device_replaces_session() {
        let h = harness().await;
        let first = h.service.login("alice", "password123", &d("d1")).await.unwrap();
        h.service.login("alice", "password123", &d("d1")).await.unwrap();

        assert_eq!(h.sessions.sessions_for(h.account.id).await.unwrap().len(), 1);
        assert_eq!(
            auth_err(h.service.verify_refresh(first.refresh.credential.as_str()).await),
            Some(AuthError::SessionRevoked)
        );
    }

    #[tokio::test]
    async fn deleted_account_is_unknown_subject() {
        let h = harness().await;
        let pair = h.service.login("alice", "password123", &d("d1")).await.unwrap();

        let fresh_store = Arc::new(InMemoryAccountStore::new());
        let service = TokenService::new(
            fresh_store,
            h.sessions.clone(),
            SigningKey::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap(),
            std::time::Duration::from_secs(300),
            std::time::Duration::from_secs(259_200),
        );
        assert_eq!(
            auth_err(service.verify_access(pair.access.credential.as_str()).await),
            Some(AuthError::UnknownSubject)
        );
    }

    #[tokio::test]
    async fn authority_changes_apply_without_reissuing() {
        let h = harness().await;
        let pair = h.service.login("alice", "password123", &d("d1")).await.unwrap();
        h.accounts
            .set_authorities(h.account.id, vec![quizgate_auth::Authority::ADMIN])
            .await
            .unwrap();

        let principal = h.service.verify_access(pair.access.credential.as_str()).await.unwrap();
        assert!(principal.is_admin());
    }

    #[tokio::test]
    async fn purge_drops_sessions_past_refresh_lifetime() {
        let h = harness().await;
        h.service.login("alice", "password123", &d("d1")).await.unwrap();

        h.clock.advance(Duration::days(3) + Duration::seconds(1));
        assert_eq!(h.service.purge_expired_sessions().await.unwrap(), 1);
        assert!(h.sessions.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_refreshes_with_one_token_yield_one_winner() {
        let h = harness().await;
        let pair = h.service.login("alice", "password123", &d("d1")).await.unwrap();
        let token = pair.refresh.credential.into_string();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let service = h.service.clone();
            let token = token.clone();
            tasks.push(tokio::spawn(async move { service.refresh(&token, &d("d1")).await.is_ok() }));
        }
        let mut winners = 0;
        for t in tasks {
            if t.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(h.sessions.sessions_for(h.account.id).await.unwrap().len(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn exactly_one_session_after_any_number_of_refreshes(refreshes in 1usize..6) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let h = harness().await;
                let mut pair = h.service.login("alice", "password123", &d("d1")).await.unwrap();
                for _ in 0..refreshes {
                    pair = h.service.refresh(pair.refresh.credential.as_str(), &d("d1")).await.unwrap();
                }
                assert_eq!(h.sessions.sessions_for(h.account.id).await.unwrap().len(), 1);
            });
        }
    }
}
