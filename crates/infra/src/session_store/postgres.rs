//! Postgres-backed session store.
//!
//! Rotation runs in a transaction (`DELETE` then `INSERT ... ON CONFLICT`),
//! and the unique index on `(account_id, device_id)` backs the one-session-
//! per-device invariant at the database level. Two racing rotations for the
//! same device therefore end with a single row holding the last writer's hash.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use quizgate_auth::{RefreshTokenHash, Session};
use quizgate_core::{AccountId, DeviceId, SessionId};

use super::SessionStore;
use crate::StoreError;
use crate::error::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    pool: Arc<PgPool>,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[derive(Debug)]
struct SessionRow {
    id: Uuid,
    account_id: Uuid,
    device_id: String,
    token_hash: String,
    issued_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for SessionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SessionRow {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            device_id: row.try_get("device_id")?,
            token_hash: row.try_get("token_hash")?,
            issued_at: row.try_get("issued_at")?,
        })
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let device_id = DeviceId::parse(row.device_id)
            .map_err(|e| StoreError::Backend(format!("invalid device_id in sessions row: {e}")))?;
        Ok(Session {
            id: SessionId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            token_hash: RefreshTokenHash::from_stored(row.token_hash),
            issued_at: row.issued_at,
            device_id,
        })
    }
}

async fn insert_session(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session: &Session,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, account_id, device_id, token_hash, issued_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (account_id, device_id)
        DO UPDATE SET
            id = EXCLUDED.id,
            token_hash = EXCLUDED.token_hash,
            issued_at = EXCLUDED.issued_at
        "#,
    )
    .bind(session.id.as_uuid())
    .bind(session.account_id.as_uuid())
    .bind(session.device_id.as_str())
    .bind(session.token_hash.as_str())
    .bind(session.issued_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_session", e))?;
    Ok(())
}

#[async_trait::async_trait]
impl SessionStore for PostgresSessionStore {
    #[instrument(
        skip(self, token_hash),
        fields(account_id = %account_id, device_id = %device_id, token = %token_hash.short()),
        err
    )]
    async fn rotate(
        &self,
        account_id: AccountId,
        device_id: &DeviceId,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let session = Session::new(account_id, device_id.clone(), token_hash, issued_at);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("DELETE FROM sessions WHERE account_id = $1 AND device_id = $2")
            .bind(account_id.as_uuid())
            .bind(device_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_device_sessions", e))?;

        insert_session(&mut tx, &session).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(session)
    }

    #[instrument(
        skip(self, expected, token_hash),
        fields(account_id = %account_id, device_id = %device_id, token = %token_hash.short()),
        err
    )]
    async fn rotate_if_current(
        &self,
        account_id: AccountId,
        device_id: &DeviceId,
        expected: &RefreshTokenHash,
        token_hash: RefreshTokenHash,
        issued_at: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Row lock serializes racing refreshes; the loser sees zero rows.
        let deleted = sqlx::query(
            "DELETE FROM sessions WHERE account_id = $1 AND device_id = $2 AND token_hash = $3",
        )
        .bind(account_id.as_uuid())
        .bind(device_id.as_str())
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_current_session", e))?
        .rows_affected();

        if deleted == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        }

        let session = Session::new(account_id, device_id.clone(), token_hash, issued_at);
        insert_session(&mut tx, &session).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some(session))
    }

    #[instrument(skip(self, token_hash), fields(token = %token_hash.short()), err)]
    async fn lookup_by_hash(&self, token_hash: &RefreshTokenHash) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, account_id, device_id, token_hash, issued_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("lookup_by_hash", e))?;

        row.map(Session::try_from).transpose()
    }

    #[instrument(skip(self), fields(account_id = %account_id, device_id = %device_id), err)]
    async fn revoke_device(&self, account_id: AccountId, device_id: &DeviceId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE account_id = $1 AND device_id = $2")
            .bind(account_id.as_uuid())
            .bind(device_id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke_device", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE issued_at < $1")
            .bind(cutoff)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("purge_older_than", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(account_id = %account_id), err)]
    async fn sessions_for(&self, account_id: AccountId) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, account_id, device_id, token_hash, issued_at
            FROM sessions
            WHERE account_id = $1
            ORDER BY device_id ASC
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sessions_for", e))?;

        rows.into_iter().map(Session::try_from).collect()
    }
}
