//! Account records as read from the user store.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::fmt;
use uuid::Uuid;

/// Opaque account identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(Uuid);

impl AccountId {
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An account as owned by the user store.
///
/// The grant pipeline only reads these records; the lockout fields are changed
/// through the store's atomic operations, never by writing a record back.
#[derive(Clone)]
pub struct AccountRecord {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub sign_in_allowed: bool,
    pub lockout_enabled: bool,
    pub failed_attempt_count: u32,
    pub lockout_end: Option<DateTime<Utc>>,
    pub security_stamp: SecretString,
    pub roles: Vec<String>,
    /// Additional `(type, value)` claims held by the store for this account.
    pub claims: Vec<(String, String)>,
}

impl AccountRecord {
    /// New account that may sign in, has lockout enabled, and never failed.
    #[must_use]
    pub fn new(id: AccountId, username: String, email: String, password_hash: String) -> Self {
        Self {
            id,
            username,
            email,
            password_hash,
            sign_in_allowed: true,
            lockout_enabled: true,
            failed_attempt_count: 0,
            lockout_end: None,
            security_stamp: SecretString::from(Uuid::new_v4().simple().to_string()),
            roles: Vec::new(),
            claims: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sign_in_allowed(mut self, allowed: bool) -> Self {
        self.sign_in_allowed = allowed;
        self
    }

    #[must_use]
    pub fn with_lockout_enabled(mut self, enabled: bool) -> Self {
        self.lockout_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_security_stamp(mut self, stamp: SecretString) -> Self {
        self.security_stamp = stamp;
        self
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push((claim_type.into(), value.into()));
        self
    }
}

impl fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"***")
            .field("sign_in_allowed", &self.sign_in_allowed)
            .field("lockout_enabled", &self.lockout_enabled)
            .field("failed_attempt_count", &self.failed_attempt_count)
            .field("lockout_end", &self.lockout_end)
            .field("security_stamp", &"***")
            .field("roles", &self.roles)
            .field("claims", &self.claims.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn new_account_defaults() {
        let account = AccountRecord::new(
            AccountId::new(Uuid::nil()),
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
        );
        assert!(account.sign_in_allowed);
        assert!(account.lockout_enabled);
        assert_eq!(account.failed_attempt_count, 0);
        assert!(account.lockout_end.is_none());
        assert!(!account.security_stamp.expose_secret().is_empty());
    }

    #[test]
    fn debug_redacts_secrets() {
        let account = AccountRecord::new(
            AccountId::new(Uuid::nil()),
            "alice".to_string(),
            "alice@example.com".to_string(),
            "$argon2id$secret-hash".to_string(),
        )
        .with_security_stamp(SecretString::from("stamp-value"));

        let rendered = format!("{account:?}");
        assert!(!rendered.contains("secret-hash"));
        assert!(!rendered.contains("stamp-value"));
        assert!(rendered.contains("alice@example.com"));
    }
}
