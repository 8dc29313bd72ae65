//! `PostgreSQL` user store.
//!
//! Lockout mutations are single `UPDATE ... RETURNING` statements, so the row
//! lock taken by `PostgreSQL` serializes concurrent failures for one account.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::{FailedAttempt, LockoutTrigger, StoreError, UserStore, normalize_username};
use crate::grant::{AccountId, AccountRecord};
use crate::password;

/// Schema applied by operators (and by the integration tests).
pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_claims(&self, id: Uuid) -> Result<Vec<(String, String)>, StoreError> {
        let query = "SELECT claim_type, claim_value FROM account_claims WHERE account_id = $1 ORDER BY id";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        rows.iter()
            .map(|row| Ok((row.try_get(0)?, row.try_get(1)?)))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }
}

fn account_from_row(row: &PgRow) -> Result<AccountRecord, StoreError> {
    let count: i32 = row.try_get("failed_attempt_count")?;
    let failed_attempt_count = u32::try_from(count)
        .map_err(|_| StoreError::InvalidRecord(format!("negative failed_attempt_count: {count}")))?;
    let id: Uuid = row.try_get("id")?;
    let stamp: String = row.try_get("security_stamp")?;

    Ok(AccountRecord {
        id: AccountId::new(id),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        sign_in_allowed: row.try_get("sign_in_allowed")?,
        lockout_enabled: row.try_get("lockout_enabled")?,
        failed_attempt_count,
        lockout_end: row.try_get("lockout_end")?,
        security_stamp: SecretString::from(stamp),
        roles: row.try_get("roles")?,
        claims: Vec::new(),
    })
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<AccountRecord>, StoreError> {
        let query = r"
            SELECT id, username, email, password_hash, sign_in_allowed, lockout_enabled,
                   failed_attempt_count, lockout_end, security_stamp, roles
            FROM accounts
            WHERE lower(username) = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(normalize_username(username))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut account = account_from_row(&row)?;
        account.claims = self.load_claims(account.id.as_uuid()).await?;
        Ok(Some(account))
    }

    async fn verify_password(
        &self,
        account: &AccountRecord,
        password: &SecretString,
    ) -> Result<bool, StoreError> {
        let phc = account.password_hash.clone();
        let candidate = password.expose_secret().to_string();
        let verified =
            tokio::task::spawn_blocking(move || password::verify_password(&phc, &candidate))
                .await?;
        Ok(verified)
    }

    async fn increment_failed_count(
        &self,
        id: AccountId,
        lockout: Option<LockoutTrigger>,
    ) -> Result<FailedAttempt, StoreError> {
        // SET expressions see the row before this update.
        let query = r"
            UPDATE accounts
            SET failed_attempt_count = failed_attempt_count + 1,
                lockout_end = CASE
                    WHEN $2 AND failed_attempt_count + 1 >= $3 THEN GREATEST(lockout_end, $4)
                    ELSE lockout_end
                END
            WHERE id = $1
            RETURNING failed_attempt_count, lockout_end
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let threshold = lockout.map_or(i32::MAX, |trigger| {
            i32::try_from(trigger.threshold).unwrap_or(i32::MAX)
        });
        let row = sqlx::query(query)
            .bind(id.as_uuid())
            .bind(lockout.is_some())
            .bind(threshold)
            .bind(lockout.map(|trigger| trigger.until))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?
            .ok_or(StoreError::AccountNotFound(id))?;

        let count: i32 = row.try_get(0)?;
        let count = u32::try_from(count)
            .map_err(|_| StoreError::InvalidRecord(format!("negative failed_attempt_count: {count}")))?;
        Ok(FailedAttempt {
            count,
            lockout_end: row.try_get(1)?,
        })
    }

    async fn reset_failed_count(
        &self,
        id: AccountId,
        unless_locked_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        // A NULL $2 resets unconditionally; otherwise a running lockout is kept.
        let query = r"
            UPDATE accounts
            SET failed_attempt_count = CASE
                    WHEN $2::timestamptz IS NULL OR lockout_end IS NULL OR lockout_end <= $2
                    THEN 0 ELSE failed_attempt_count
                END,
                lockout_end = CASE
                    WHEN $2::timestamptz IS NULL OR lockout_end IS NULL OR lockout_end <= $2
                    THEN NULL ELSE lockout_end
                END
            WHERE id = $1
            RETURNING lockout_end IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id.as_uuid())
            .bind(unless_locked_at)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?
            .ok_or(StoreError::AccountNotFound(id))?;

        Ok(row.try_get(0)?)
    }

    async fn set_lockout_end(&self, id: AccountId, until: DateTime<Utc>) -> Result<(), StoreError> {
        // GREATEST ignores NULL, so an unlocked account takes `until` as is.
        let query = "UPDATE accounts SET lockout_end = GREATEST(lockout_end, $2) WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id.as_uuid())
            .bind(until)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}
