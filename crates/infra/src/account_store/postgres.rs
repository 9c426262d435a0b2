use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use quizgate_auth::{Account, Authority};
use quizgate_core::AccountId;

use super::AccountStore;
use crate::StoreError;
use crate::error::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: Arc<PgPool>,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

struct AccountRow {
    id: Uuid,
    username: String,
    password_hash: String,
    authorities: Vec<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            authorities: row.try_get("authorities")?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account::from_parts(
            AccountId::from_uuid(row.id),
            row.username,
            row.password_hash,
            row.authorities.into_iter().map(Authority::new).collect(),
        )
    }
}

fn authority_names(authorities: &[Authority]) -> Vec<String> {
    authorities.iter().map(|a| a.as_str().to_string()).collect()
}

#[async_trait::async_trait]
impl AccountStore for PostgresAccountStore {
    #[instrument(skip(self, account), fields(account_id = %account.id), err)]
    async fn insert(&self, account: Account) -> Result<Account, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, password_hash, authorities)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.username)
        .bind(account.password_hash())
        .bind(authority_names(&account.authorities))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(account)
    }

    #[instrument(skip(self), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, username, password_hash, authorities FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_username", e))?;
        Ok(row.map(Account::from))
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, username, password_hash, authorities FROM accounts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_id", e))?;
        Ok(row.map(Account::from))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM accounts WHERE username = $1)")
            .bind(username)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_by_username", e))
    }

    #[instrument(skip(self, authorities), fields(account_id = %id), err)]
    async fn set_authorities(&self, id: AccountId, authorities: Vec<Authority>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE accounts SET authorities = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(authority_names(&authorities))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_authorities", e))?;
        Ok(result.rows_affected() > 0)
    }
}
