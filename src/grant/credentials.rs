//! Username/password validation for the password grant.
//!
//! Every rejection is reported as `GrantError::InvalidGrant` so the response
//! for an unknown user, a disabled account, a locked account, and a wrong
//! password is the same. The reason is only logged.
//!
//! Unknown users and locked accounts return without a password hash check, so
//! response timing can still differ from the wrong-password path.

use secrecy::SecretString;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};

use super::{
    AccountLockoutTracker, AccountRecord, Clock, FailureReason, GrantError, LockoutPolicy,
};
use crate::store::UserStore;

pub struct CredentialValidator {
    store: Arc<dyn UserStore>,
    lockout: AccountLockoutTracker,
    clock: Arc<dyn Clock>,
}

impl CredentialValidator {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            lockout: AccountLockoutTracker::new(Arc::clone(&store), policy),
            store,
            clock,
        }
    }

    /// Authenticate `username` with `password`.
    ///
    /// On success the returned account reflects the reset lockout state. The
    /// reset is refused when a lockout started while the password was being
    /// verified, and the attempt is then rejected as locked out.
    ///
    /// # Errors
    /// `InvalidGrant` for any credential rejection, `Store` if the user store fails.
    pub async fn validate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AccountRecord, GrantError> {
        let span = info_span!("grant.validate_credentials");
        async move {
            let Some(mut account) = self.store.find_by_username(username).await? else {
                return Err(reject(FailureReason::UnknownAccount, None));
            };

            if !account.sign_in_allowed {
                return Err(reject(FailureReason::SignInNotAllowed, Some(&account)));
            }

            let now = self.clock.now();
            if self.lockout.is_locked_out(&account, now) {
                return Err(reject(FailureReason::LockedOut, Some(&account)));
            }

            if !self.store.verify_password(&account, password).await? {
                let outcome = self.lockout.record_failure(&account, now).await?;
                debug!(
                    account_id = %account.id,
                    failed_attempts = outcome.failed_attempts,
                    "Recorded failed password attempt"
                );
                return Err(reject(FailureReason::BadPassword, Some(&account)));
            }

            // A concurrent failure may have locked the account since lookup.
            if !self.lockout.reset(&account, self.clock.now()).await? {
                return Err(reject(FailureReason::LockedOut, Some(&account)));
            }
            account.failed_attempt_count = 0;
            account.lockout_end = None;

            debug!(account_id = %account.id, "Credentials accepted");
            Ok(account)
        }
        .instrument(span)
        .await
    }
}

fn reject(reason: FailureReason, account: Option<&AccountRecord>) -> GrantError {
    match account {
        Some(account) => info!(reason = %reason, account_id = %account.id, "Password grant rejected"),
        None => info!(reason = %reason, "Password grant rejected"),
    }
    GrantError::InvalidGrant(reason)
}
