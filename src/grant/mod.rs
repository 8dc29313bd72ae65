//! Password grant decision pipeline.
//!
//! Flow Overview:
//! 1) [`TokenExchange`] rejects anything that is not a password grant.
//! 2) [`CredentialValidator`] looks the account up, checks eligibility and
//!    lockout, verifies the password, and updates the lockout counters through
//!    [`AccountLockoutTracker`].
//! 3) [`ScopeNegotiator`] intersects the requested scopes with the allowed set.
//! 4) [`ClaimProjector`] assigns token destinations to the principal's claims.
//! 5) The resulting [`AuthenticationTicket`] is handed to the token signer.
//!
//! Only step 2 touches shared state (the per-account lockout pair). Steps 3 and
//! 4 are pure functions over request-scoped values.

mod account;
mod claims;
mod clock;
mod config;
mod credentials;
mod error;
mod exchange;
mod lockout;
mod scope;
mod ticket;

pub use account::{AccountId, AccountRecord};
pub use claims::{Claim, ClaimProjector, ClaimType, Destination, principal_claims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GrantConfig, LockoutPolicy};
pub use credentials::CredentialValidator;
pub use error::{
    FailureReason, GrantError, INVALID_GRANT_DESCRIPTION, UNSUPPORTED_GRANT_TYPE_DESCRIPTION,
};
pub use exchange::{ExchangeStage, GrantType, IssuedGrant, TokenExchange, TokenRequest};
pub use lockout::{AccountLockoutTracker, FailureOutcome};
pub use scope::{ScopeNegotiator, format_scopes, parse_scopes};
pub use ticket::AuthenticationTicket;

/// Scope names understood by the grant pipeline.
pub mod scopes {
    pub const OPENID: &str = "openid";
    pub const EMAIL: &str = "email";
    pub const PROFILE: &str = "profile";
    pub const ROLES: &str = "roles";

    /// Every scope this service knows how to honour.
    pub const SUPPORTED: [&str; 4] = [OPENID, EMAIL, PROFILE, ROLES];
}
