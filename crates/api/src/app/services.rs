use std::sync::Arc;

use anyhow::Context;

use quizgate_auth::{PermissionEvaluator, PolicyEngine};
use quizgate_infra::{
    AccountService, AccountStore, AuthConfig, InMemoryAccountStore, InMemoryAclProvider, InMemorySessionStore,
    PostgresAccountStore, PostgresSessionStore, SessionStore, TokenService, db,
};

/// Everything a handler can reach.
#[derive(Clone)]
pub struct AppServices {
    pub tokens: TokenService,
    pub accounts: AccountService,
    pub policy: Arc<PolicyEngine>,
    /// Resource ACLs; owned by the domain layer, in memory here.
    pub acl: Arc<InMemoryAclProvider>,
    pub sessions: Arc<dyn SessionStore>,
    pub account_store: Arc<dyn AccountStore>,
}

impl AppServices {
    pub fn assemble(
        config: &AuthConfig,
        account_store: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> anyhow::Result<Self> {
        let tokens = TokenService::from_config(config, account_store.clone(), sessions.clone())
            .context("failed to build token service")?;
        let acl = Arc::new(InMemoryAclProvider::new());
        let policy = Arc::new(PolicyEngine::new(PermissionEvaluator::new(acl.clone())));

        Ok(Self {
            tokens,
            accounts: AccountService::new(account_store.clone()),
            policy,
            acl,
            sessions,
            account_store,
        })
    }

    /// In-memory stores (dev/test).
    pub fn in_memory(config: &AuthConfig) -> anyhow::Result<Self> {
        Self::assemble(
            config,
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemorySessionStore::new()),
        )
    }

    pub async fn persistent(config: &AuthConfig, database_url: &str) -> anyhow::Result<Self> {
        let pool = db::connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        db::ensure_schema(&pool)
            .await
            .context("failed to prepare database schema")?;

        Self::assemble(
            config,
            Arc::new(PostgresAccountStore::new(pool.clone())),
            Arc::new(PostgresSessionStore::new(pool)),
        )
    }
}

/// Pick in-memory or Postgres stores according to `config`.
pub async fn build_services(config: &AuthConfig) -> anyhow::Result<AppServices> {
    match (&config.database_url, config.use_persistent_stores) {
        (Some(url), true) => {
            tracing::info!("using Postgres stores");
            AppServices::persistent(config, url).await
        }
        _ => {
            tracing::info!("using in-memory stores");
            AppServices::in_memory(config)
        }
    }
}
