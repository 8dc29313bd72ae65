//! Grant pipeline configuration.
//!
//! Built once at startup from CLI/env values and validated before the server
//! binds. Components receive the pieces they need by value.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;
use std::time::Duration;

use super::scopes;

const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
const DEFAULT_LOCKOUT_DURATION_SECONDS: u64 = 5 * 60;
const DEFAULT_SECURITY_STAMP_CLAIM_TYPE: &str = "security_stamp";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("lockout max failed attempts must be greater than zero")]
    ZeroMaxFailedAttempts,
    #[error("lockout duration must be greater than zero")]
    ZeroLockoutDuration,
    #[error("lockout duration is out of range")]
    LockoutDurationOutOfRange,
    #[error("at least one allowed scope is required")]
    NoAllowedScopes,
    #[error("unsupported scope in allowed set: {0}")]
    UnsupportedScope(String),
    #[error("resource identifier must not be empty")]
    EmptyResource,
    #[error("security stamp claim type must not be empty")]
    EmptySecurityStampClaimType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_failed_attempts: u32,
    lockout_duration: Duration,
    enabled: bool,
}

impl LockoutPolicy {
    #[must_use]
    pub const fn new(max_failed_attempts: u32, lockout_duration: Duration, enabled: bool) -> Self {
        Self {
            max_failed_attempts,
            lockout_duration,
            enabled,
        }
    }

    #[must_use]
    pub const fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    #[must_use]
    pub const fn lockout_duration(&self) -> Duration {
        self.lockout_duration
    }

    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// End of a lockout starting at `now`.
    ///
    /// Saturates to the maximum representable instant, so an overflowing
    /// duration locks the account rather than skipping the lockout.
    #[must_use]
    pub fn lockout_end_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.lockout_duration)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// # Errors
    /// Returns an error for a zero threshold or an empty/unrepresentable duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failed_attempts == 0 {
            return Err(ConfigError::ZeroMaxFailedAttempts);
        }
        if self.lockout_duration.is_zero() {
            return Err(ConfigError::ZeroLockoutDuration);
        }
        if TimeDelta::from_std(self.lockout_duration).is_err() {
            return Err(ConfigError::LockoutDurationOutOfRange);
        }
        Ok(())
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_FAILED_ATTEMPTS,
            Duration::from_secs(DEFAULT_LOCKOUT_DURATION_SECONDS),
            true,
        )
    }
}

#[derive(Clone, Debug)]
pub struct GrantConfig {
    resource: String,
    allowed_scopes: BTreeSet<String>,
    security_stamp_claim_type: String,
    lockout: LockoutPolicy,
}

impl GrantConfig {
    #[must_use]
    pub fn new(resource: String) -> Self {
        Self {
            resource,
            allowed_scopes: scopes::SUPPORTED.iter().map(ToString::to_string).collect(),
            security_stamp_claim_type: DEFAULT_SECURITY_STAMP_CLAIM_TYPE.to_string(),
            lockout: LockoutPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_allowed_scopes<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_scopes = allowed.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_security_stamp_claim_type(mut self, claim_type: String) -> Self {
        self.security_stamp_claim_type = claim_type;
        self
    }

    #[must_use]
    pub fn with_lockout(mut self, lockout: LockoutPolicy) -> Self {
        self.lockout = lockout;
        self
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn allowed_scopes(&self) -> &BTreeSet<String> {
        &self.allowed_scopes
    }

    #[must_use]
    pub fn security_stamp_claim_type(&self) -> &str {
        &self.security_stamp_claim_type
    }

    #[must_use]
    pub fn lockout(&self) -> LockoutPolicy {
        self.lockout
    }

    /// Check the whole configuration; called once before serving requests.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resource.trim().is_empty() {
            return Err(ConfigError::EmptyResource);
        }
        if self.security_stamp_claim_type.trim().is_empty() {
            return Err(ConfigError::EmptySecurityStampClaimType);
        }
        if self.allowed_scopes.is_empty() {
            return Err(ConfigError::NoAllowedScopes);
        }
        if let Some(unsupported) = self
            .allowed_scopes
            .iter()
            .find(|scope| !scopes::SUPPORTED.contains(&scope.as_str()))
        {
            return Err(ConfigError::UnsupportedScope(unsupported.clone()));
        }
        self.lockout.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_config_defaults_and_overrides() {
        let config = GrantConfig::new("api.example".to_string());
        assert_eq!(config.resource(), "api.example");
        assert_eq!(config.allowed_scopes().len(), 4);
        assert_eq!(
            config.security_stamp_claim_type(),
            DEFAULT_SECURITY_STAMP_CLAIM_TYPE
        );
        assert_eq!(config.lockout(), LockoutPolicy::default());
        assert_eq!(config.validate(), Ok(()));

        let config = config
            .with_allowed_scopes(["openid", "email"])
            .with_security_stamp_claim_type("AspNet.Identity.SecurityStamp".to_string())
            .with_lockout(LockoutPolicy::new(3, Duration::from_secs(60), false));

        assert_eq!(config.allowed_scopes().len(), 2);
        assert_eq!(
            config.security_stamp_claim_type(),
            "AspNet.Identity.SecurityStamp"
        );
        assert_eq!(config.lockout().max_failed_attempts(), 3);
        assert!(!config.lockout().enabled());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let base = GrantConfig::new("api.example".to_string());

        assert_eq!(
            GrantConfig::new("  ".to_string()).validate(),
            Err(ConfigError::EmptyResource)
        );
        assert_eq!(
            base.clone()
                .with_allowed_scopes(Vec::<String>::new())
                .validate(),
            Err(ConfigError::NoAllowedScopes)
        );
        assert_eq!(
            base.clone()
                .with_allowed_scopes(["openid", "offline_access"])
                .validate(),
            Err(ConfigError::UnsupportedScope("offline_access".to_string()))
        );
        assert_eq!(
            base.clone()
                .with_security_stamp_claim_type(String::new())
                .validate(),
            Err(ConfigError::EmptySecurityStampClaimType)
        );
        assert_eq!(
            base.clone()
                .with_lockout(LockoutPolicy::new(0, Duration::from_secs(60), true))
                .validate(),
            Err(ConfigError::ZeroMaxFailedAttempts)
        );
        assert_eq!(
            base.with_lockout(LockoutPolicy::new(5, Duration::ZERO, true))
                .validate(),
            Err(ConfigError::ZeroLockoutDuration)
        );
    }

    #[test]
    fn lockout_end_adds_duration() {
        let policy = LockoutPolicy::new(5, Duration::from_secs(300), true);
        let now = Utc::now();
        assert_eq!(policy.lockout_end_from(now), now + TimeDelta::seconds(300));
    }

    #[test]
    fn lockout_end_saturates_on_overflow() {
        let policy = LockoutPolicy::new(5, Duration::from_secs(u64::MAX), true);
        assert_eq!(
            policy.lockout_end_from(Utc::now()),
            DateTime::<Utc>::MAX_UTC
        );
        assert_eq!(
            policy.validate(),
            Err(ConfigError::LockoutDurationOutOfRange)
        );
    }
}
