//! Periodic removal of sessions whose refresh credential has expired.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::TokenService;

/// Handle to stop a running janitor.
#[derive(Debug)]
pub struct JanitorHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl JanitorHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.join.await;
    }
}

#[derive(Debug)]
pub struct SessionJanitor {
    tokens: TokenService,
    interval: Duration,
}

impl SessionJanitor {
    pub fn new(tokens: TokenService, interval: Duration) -> Self {
        Self { tokens, interval }
    }

    /// Run one purge pass; failures are logged, never propagated.
    pub async fn run_once(&self) -> u64 {
        match self.tokens.purge_expired_sessions().await {
            Ok(0) => 0,
            Ok(purged) => {
                tracing::info!(purged, "purged expired sessions");
                purged
            }
            Err(err) => {
                tracing::warn!(error = %err, "session purge failed");
                0
            }
        }
    }

    pub fn start(self) -> JanitorHandle {
        let shutdown = Arc::new(Notify::new());
        let signal = shutdown.clone();

        let join = tokio::spawn(async move {
            tracing::info!(interval_secs = self.interval.as_secs(), "session janitor started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = signal.notified() => {
                        tracing::info!("session janitor received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }
        });

        JanitorHandle { shutdown, join }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use quizgate_auth::{Account, SigningKey};
    use quizgate_core::DeviceId;

    use super::*;
    use crate::{AccountStore, InMemoryAccountStore, InMemorySessionStore, ManualClock};

    #[tokio::test]
    async fn janitor_purges_on_tick_and_stops_on_shutdown() {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        accounts
            .insert(Account::register("alice", "password123").unwrap())
            .await
            .unwrap();
        let tokens = TokenService::new(
            accounts,
            sessions.clone(),
            SigningKey::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap(),
            Duration::from_secs(300),
            Duration::from_secs(3600),
        )
        .with_clock(clock.clone());

        tokens
            .login("alice", "password123", &DeviceId::parse("d1").unwrap())
            .await
            .unwrap();
        clock.advance(ChronoDuration::hours(2));

        let handle = SessionJanitor::new(tokens, Duration::from_millis(10)).start();
        for _ in 0..100 {
            if sessions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sessions.is_empty());

        handle.shutdown().await;
    }
}
