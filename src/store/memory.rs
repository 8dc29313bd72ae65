//! In-process user store.
//!
//! Every lockout mutation happens while holding the same async mutex, so
//! concurrent failures for one account are applied one after the other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{FailedAttempt, LockoutTrigger, StoreError, UserStore, normalize_username};
use crate::grant::{AccountId, AccountRecord};
use crate::password;

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    accounts: Mutex<HashMap<AccountId, AccountRecord>>,
    lookups: AtomicUsize,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an account.
    pub async fn insert(&self, account: AccountRecord) {
        self.accounts.lock().await.insert(account.id, account);
    }

    /// Current stored state of an account.
    pub async fn get(&self, id: AccountId) -> Option<AccountRecord> {
        self.accounts.lock().await.get(&id).cloned()
    }

    /// Number of `find_by_username` calls served so far.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<AccountRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let wanted = normalize_username(username);
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|account| normalize_username(&account.username) == wanted)
            .cloned())
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
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(&id)
            .ok_or(StoreError::AccountNotFound(id))?;
        account.failed_attempt_count = account.failed_attempt_count.saturating_add(1);
        if let Some(trigger) = lockout
            && account.failed_attempt_count >= trigger.threshold
        {
            account.lockout_end = Some(
                account
                    .lockout_end
                    .map_or(trigger.until, |end| end.max(trigger.until)),
            );
        }
        Ok(FailedAttempt {
            count: account.failed_attempt_count,
            lockout_end: account.lockout_end,
        })
    }

    async fn reset_failed_count(
        &self,
        id: AccountId,
        unless_locked_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(&id)
            .ok_or(StoreError::AccountNotFound(id))?;
        if let Some(now) = unless_locked_at
            && account.lockout_end.is_some_and(|end| now < end)
        {
            return Ok(false);
        }
        account.failed_attempt_count = 0;
        account.lockout_end = None;
        Ok(true)
    }

    async fn set_lockout_end(&self, id: AccountId, until: DateTime<Utc>) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(&id)
            .ok_or(StoreError::AccountNotFound(id))?;
        account.lockout_end = Some(account.lockout_end.map_or(until, |end| end.max(until)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use chrono::TimeDelta;
    use std::sync::Arc;
    use uuid::Uuid;

    fn account(username: &str, password: &str) -> Result<AccountRecord> {
        let params = argon2::Params::new(8, 1, 1, None).map_err(|e| anyhow!(e.to_string()))?;
        let hash = password::hash_password(password, params).map_err(|e| anyhow!(e.to_string()))?;
        Ok(AccountRecord::new(
            AccountId::new(Uuid::new_v4()),
            username.to_string(),
            format!("{username}@example.com"),
            hash,
        ))
    }

    #[tokio::test]
    async fn find_by_username_is_case_insensitive() -> Result<()> {
        let store = MemoryUserStore::new();
        store.insert(account("Alice", "correct")?).await;

        let found = store.find_by_username("  alice ").await?;
        assert_eq!(found.map(|a| a.username), Some("Alice".to_string()));
        assert!(store.find_by_username("bob").await?.is_none());
        assert_eq!(store.lookup_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn verify_password_checks_hash() -> Result<()> {
        let store = MemoryUserStore::new();
        let alice = account("alice", "correct")?;
        assert!(
            store
                .verify_password(&alice, &SecretString::from("correct"))
                .await?
        );
        assert!(
            !store
                .verify_password(&alice, &SecretString::from("wrong"))
                .await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn lockout_counters() -> Result<()> {
        let store = MemoryUserStore::new();
        let alice = account("alice", "correct")?;
        let id = alice.id;
        store.insert(alice).await;

        let now = Utc::now();
        let trigger = LockoutTrigger {
            threshold: 2,
            until: now + TimeDelta::minutes(5),
        };
        assert_eq!(
            store.increment_failed_count(id, Some(trigger)).await?,
            FailedAttempt {
                count: 1,
                lockout_end: None
            }
        );
        assert_eq!(
            store.increment_failed_count(id, Some(trigger)).await?,
            FailedAttempt {
                count: 2,
                lockout_end: Some(now + TimeDelta::minutes(5))
            }
        );

        // An earlier end never shortens the lockout.
        store.set_lockout_end(id, now).await?;
        let stored = store.get(id).await.ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(stored.lockout_end, Some(now + TimeDelta::minutes(5)));

        // Running lockout: the conditional reset leaves everything in place.
        assert!(!store.reset_failed_count(id, Some(now)).await?);
        let stored = store.get(id).await.ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(stored.failed_attempt_count, 2);

        assert!(
            store
                .reset_failed_count(id, Some(now + TimeDelta::minutes(5)))
                .await?
        );
        let stored = store.get(id).await.ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(stored.failed_attempt_count, 0);
        assert!(stored.lockout_end.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unconditional_reset_clears_running_lockout() -> Result<()> {
        let store = MemoryUserStore::new();
        let alice = account("alice", "correct")?;
        let id = alice.id;
        store.insert(alice).await;

        let now = Utc::now();
        store.set_lockout_end(id, now + TimeDelta::minutes(5)).await?;
        assert!(store.reset_failed_count(id, None).await?);
        let stored = store.get(id).await.ok_or_else(|| anyhow!("missing"))?;
        assert!(stored.lockout_end.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_account_is_an_error() {
        let store = MemoryUserStore::new();
        let id = AccountId::new(Uuid::new_v4());
        assert!(matches!(
            store.increment_failed_count(id, None).await,
            Err(StoreError::AccountNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() -> Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let alice = account("alice", "correct")?;
        let id = alice.id;
        store.insert(alice).await;

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .increment_failed_count(id, None)
                    .await
                    .map(|attempt| attempt.count)
            }));
        }

        let mut counts = Vec::new();
        for task in tasks {
            counts.push(task.await??);
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=20).collect::<Vec<u32>>());
        Ok(())
    }
}
