//! Account lockout state transitions.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::{AccountRecord, LockoutPolicy};
use crate::store::{LockoutTrigger, StoreError, UserStore};

/// Result of recording one failed password attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailureOutcome {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

pub struct AccountLockoutTracker {
    store: Arc<dyn UserStore>,
    policy: LockoutPolicy,
}

impl AccountLockoutTracker {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, policy: LockoutPolicy) -> Self {
        Self { store, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Lockout applies only when both the policy and the account enable it.
    #[must_use]
    pub const fn applies_to(&self, account: &AccountRecord) -> bool {
        self.policy.enabled() && account.lockout_enabled
    }

    #[must_use]
    pub fn is_locked_out(&self, account: &AccountRecord, now: DateTime<Utc>) -> bool {
        self.applies_to(account) && account.lockout_end.is_some_and(|end| now < end)
    }

    /// Count one failure and lock the account when the threshold is reached.
    ///
    /// The store applies the increment and the lock in one atomic update, so
    /// the decision never depends on the count carried on `account`.
    ///
    /// # Errors
    /// Returns the store error if the update fails.
    pub async fn record_failure(
        &self,
        account: &AccountRecord,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, StoreError> {
        let trigger = self.applies_to(account).then(|| LockoutTrigger {
            threshold: self.policy.max_failed_attempts(),
            until: self.policy.lockout_end_from(now),
        });
        let attempt = self.store.increment_failed_count(account.id, trigger).await?;

        let locked_until = trigger
            .filter(|trigger| attempt.count >= trigger.threshold)
            .and(attempt.lockout_end);
        if let Some(until) = locked_until {
            warn!(
                account_id = %account.id,
                failed_attempts = attempt.count,
                locked_until = %until,
                "Account locked out after repeated failed sign-in attempts"
            );
        }

        Ok(FailureOutcome {
            failed_attempts: attempt.count,
            locked_until,
        })
    }

    /// Clear the failure count and any lockout end after a successful sign-in.
    ///
    /// Returns `false`, leaving the account untouched, when a lockout set by a
    /// concurrent request is still running at `now`.
    ///
    /// # Errors
    /// Returns the store error if the reset fails.
    pub async fn reset(
        &self,
        account: &AccountRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let unless_locked_at = self.applies_to(account).then_some(now);
        let reset = self
            .store
            .reset_failed_count(account.id, unless_locked_at)
            .await?;

        if !reset {
            warn!(
                account_id = %account.id,
                "Account locked while the password was being verified"
            );
        } else if account.failed_attempt_count > 0 || account.lockout_end.is_some() {
            info!(account_id = %account.id, "Reset failed sign-in attempts");
        }
        Ok(reset)
    }
}
