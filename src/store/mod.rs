//! Account storage used by the grant pipeline.
//!
//! The lockout counters are the only shared mutable state in the service, so
//! every implementation must apply `increment_failed_count`,
//! `reset_failed_count`, and `set_lockout_end` atomically per account. The
//! increment sets the lock in the same step once the threshold is reached, and
//! returns the pair as it left it. A conditional reset leaves a running lockout
//! in place.

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::grant::{AccountId, AccountRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("invalid account record: {0}")]
    InvalidRecord(String),
    #[error("password verification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Lock applied by `increment_failed_count` once the count reaches `threshold`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutTrigger {
    pub threshold: u32,
    pub until: DateTime<Utc>,
}

/// Lockout pair as left by one `increment_failed_count` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailedAttempt {
    pub count: u32,
    pub lockout_end: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look an account up by username (trimmed, case-insensitive).
    async fn find_by_username(&self, username: &str) -> Result<Option<AccountRecord>, StoreError>;

    /// Check `password` against the account's stored hash.
    async fn verify_password(
        &self,
        account: &AccountRecord,
        password: &SecretString,
    ) -> Result<bool, StoreError>;

    /// Atomically add one failure. When `lockout` is given and the new count
    /// reaches its threshold, the lockout end is set in the same update.
    async fn increment_failed_count(
        &self,
        id: AccountId,
        lockout: Option<LockoutTrigger>,
    ) -> Result<FailedAttempt, StoreError>;

    /// Atomically reset the failure count and clear any lockout end.
    ///
    /// With `unless_locked_at`, nothing changes and `false` is returned when
    /// the account is locked at that instant.
    async fn reset_failed_count(
        &self,
        id: AccountId,
        unless_locked_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// Lock the account until `until`. Never moves an existing lockout end backwards.
    async fn set_lockout_end(&self, id: AccountId, until: DateTime<Utc>) -> Result<(), StoreError>;

    /// Cheap liveness probe for `/health`.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Normalize a username for lookups.
#[must_use]
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
