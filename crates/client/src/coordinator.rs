//! Single-flight refresh of the access credential.
//!
//! When a request sees a 401, it calls [`RefreshCoordinator::recover`] with the
//! access token it used. Exactly one caller (the leader) wins the
//! `refreshing` flag and issues the refresh call. Everyone else waits on a
//! `watch` gate for that result, up to `wait_timeout`. The refresh itself runs
//! on its own task, so neither a cancelled leader nor a timed-out waiter can
//! abort it halfway.
//!
//! A burst ends the same way for every participant: all retry with the new
//! access token, or all get [`ClientError::ReauthRequired`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use quizgate_core::DeviceId;

use crate::cache::{CredentialCache, Credentials};
use crate::error::ClientError;
use crate::transport::RefreshTransport;

type ReauthHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Refreshed,
    Rejected,
    Unavailable(String),
}

/// `generation` moves on every login; a refresh started under an older
/// generation may no longer touch the gate or the cache.
#[derive(Debug, Clone)]
struct Gate {
    refreshing: bool,
    generation: u64,
    last: Option<Outcome>,
}

enum Completion {
    Refreshed(Credentials),
    Rejected,
    Unavailable(String),
}

enum Role {
    Leader(Credentials, u64),
    Follower,
    Retry(String),
    Reauth,
}

struct Inner {
    cache: Arc<CredentialCache>,
    transport: Arc<dyn RefreshTransport>,
    device_id: DeviceId,
    wait_timeout: Duration,
    gate: watch::Sender<Gate>,
    reauth_fired: AtomicBool,
    on_reauth: Option<ReauthHook>,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("device_id", &self.inner.device_id)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(
        cache: Arc<CredentialCache>,
        transport: Arc<dyn RefreshTransport>,
        device_id: DeviceId,
        wait_timeout: Duration,
    ) -> Self {
        Self::build(cache, transport, device_id, wait_timeout, None)
    }

    /// Same as [`RefreshCoordinator::new`], plus a re-login hook that fires
    /// once per authenticated lifetime when the session turns out to be dead.
    pub fn with_reauth_hook(
        cache: Arc<CredentialCache>,
        transport: Arc<dyn RefreshTransport>,
        device_id: DeviceId,
        wait_timeout: Duration,
        hook: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self::build(cache, transport, device_id, wait_timeout, Some(Arc::new(hook)))
    }

    fn build(
        cache: Arc<CredentialCache>,
        transport: Arc<dyn RefreshTransport>,
        device_id: DeviceId,
        wait_timeout: Duration,
        on_reauth: Option<ReauthHook>,
    ) -> Self {
        let (gate, _) = watch::channel(Gate {
            refreshing: false,
            generation: 0,
            last: None,
        });
        Self {
            inner: Arc::new(Inner {
                cache,
                transport,
                device_id,
                wait_timeout,
                gate,
                reauth_fired: AtomicBool::new(false),
                on_reauth,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<CredentialCache> {
        &self.inner.cache
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.gate.borrow().refreshing
    }

    /// Install fresh credentials after a login and re-arm the re-login hook.
    ///
    /// A refresh still in flight is superseded: its waiters are released onto
    /// the new credentials and its result is discarded.
    pub fn install(&self, credentials: Credentials) {
        let inner = &self.inner;
        inner.gate.send_modify(|gate| {
            inner.cache.set(credentials);
            gate.generation += 1;
            if gate.refreshing {
                gate.refreshing = false;
                gate.last = Some(Outcome::Refreshed);
            }
        });
        inner.reauth_fired.store(false, Ordering::SeqCst);
    }

    /// Recover from a 401 observed with `rejected_access`.
    ///
    /// Returns the access token to retry with.
    pub async fn recover(&self, rejected_access: &str) -> Result<String, ClientError> {
        let inner = &self.inner;

        // Decide the role under the gate lock. The leader writes the cache
        // before it clears `refreshing`, so a late caller either sees the
        // refresh in flight or its result.
        let mut role = Role::Reauth;
        inner.gate.send_if_modified(|gate| {
            if gate.refreshing {
                role = Role::Follower;
                return false;
            }
            match inner.cache.current() {
                None => {
                    role = Role::Reauth;
                    false
                }
                Some(current) if current.access_token != rejected_access => {
                    role = Role::Retry(current.access_token);
                    false
                }
                Some(current) => {
                    gate.refreshing = true;
                    role = Role::Leader(current, gate.generation);
                    true
                }
            }
        });

        match role {
            Role::Retry(token) => Ok(token),
            Role::Reauth => Err(ClientError::ReauthRequired),
            Role::Follower => self.wait_for_leader().await,
            Role::Leader(current, generation) => {
                tracing::debug!(device_id = %inner.device_id, "refreshing access credential");
                let task = tokio::spawn(Self::run_refresh(Arc::clone(inner), current.refresh_token, generation));
                match task.await {
                    Ok(result) => result,
                    Err(e) => Err(ClientError::RefreshUnavailable(e.to_string())),
                }
            }
        }
    }

    async fn run_refresh(inner: Arc<Inner>, refresh_token: String, generation: u64) -> Result<String, ClientError> {
        let mut guard = GateGuard {
            inner: &inner,
            generation,
            finished: false,
        };

        let (completion, reply) = match inner.transport.refresh(&refresh_token, &inner.device_id).await {
            Ok(credentials) => {
                let access = credentials.access_token.clone();
                (Completion::Refreshed(credentials), Ok(access))
            }
            Err(ClientError::Unauthorized { code }) => {
                tracing::warn!(device_id = %inner.device_id, error = %code, "refresh rejected");
                (Completion::Rejected, Err(ClientError::ReauthRequired))
            }
            Err(e) => {
                tracing::warn!(device_id = %inner.device_id, error = %e, "refresh failed");
                let msg = e.to_string();
                (Completion::Unavailable(msg.clone()), Err(ClientError::RefreshUnavailable(msg)))
            }
        };

        let rejected = matches!(completion, Completion::Rejected);
        if !guard.finish(completion) {
            tracing::debug!(device_id = %inner.device_id, "refresh superseded by a new login");
            return inner.cache.access_token().ok_or(ClientError::ReauthRequired);
        }
        if rejected {
            fire_reauth(&inner);
        }
        reply
    }

    async fn wait_for_leader(&self) -> Result<String, ClientError> {
        let inner = &self.inner;
        let mut rx = inner.gate.subscribe();

        let waited = tokio::time::timeout(inner.wait_timeout, async {
            rx.wait_for(|gate| !gate.refreshing).await.map(|gate| gate.last.clone())
        })
        .await;

        match waited {
            Ok(Ok(Some(Outcome::Refreshed))) => inner.cache.access_token().ok_or(ClientError::ReauthRequired),
            Ok(Ok(Some(Outcome::Unavailable(msg)))) => Err(ClientError::RefreshUnavailable(msg)),
            Ok(Ok(_)) | Ok(Err(_)) => Err(ClientError::ReauthRequired),
            Err(_) => {
                tracing::warn!(
                    device_id = %inner.device_id,
                    timeout_ms = inner.wait_timeout.as_millis() as u64,
                    "gave up waiting for credential refresh"
                );
                fire_reauth(inner);
                Err(ClientError::ReauthRequired)
            }
        }
    }
}

/// Opens the gate exactly once for one refresh, even when the refresh task
/// panics or is dropped before it produced a result.
struct GateGuard<'a> {
    inner: &'a Inner,
    generation: u64,
    finished: bool,
}

impl GateGuard<'_> {
    /// Publish `completion`; false when a login superseded this refresh.
    fn finish(&mut self, completion: Completion) -> bool {
        self.finished = true;
        let (inner, generation) = (self.inner, self.generation);
        inner.gate.send_if_modified(|gate| {
            if gate.generation != generation {
                return false;
            }
            let last = match completion {
                Completion::Refreshed(credentials) => {
                    inner.cache.set(credentials);
                    Outcome::Refreshed
                }
                Completion::Rejected => {
                    inner.cache.clear();
                    Outcome::Rejected
                }
                Completion::Unavailable(msg) => Outcome::Unavailable(msg),
            };
            gate.refreshing = false;
            gate.last = Some(last);
            true
        })
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(device_id = %self.inner.device_id, "refresh ended without a result");
            self.finish(Completion::Unavailable("refresh ended without a result".to_string()));
        }
    }
}

fn fire_reauth(inner: &Inner) {
    if inner.reauth_fired.swap(true, Ordering::SeqCst) {
        return;
    }
    tracing::info!(device_id = %inner.device_id, "re-authentication required");
    if let Some(hook) = &inner.on_reauth {
        hook();
    }
}
