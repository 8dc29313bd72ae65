//! # Grantor (Resource-Owner Password Grant Authority)
//!
//! `grantor` issues tokens for the OAuth2 resource-owner password credentials
//! grant. Every token request runs the same decision pipeline: validate the
//! credentials against the account store, negotiate the requested scopes, and
//! project the principal's claims onto the access and identity tokens.
//!
//! ## Credential Validation
//!
//! Unknown users, disabled users, locked-out users, and wrong passwords all
//! produce the same `invalid_grant` response so that the token endpoint cannot
//! be used to enumerate accounts. The internal reason is only logged.
//!
//! ## Account Lockout
//!
//! Each wrong password atomically increments the account's failure counter in
//! the store. When the counter reaches the configured threshold the account is
//! locked for the configured duration; expiry is evaluated lazily on the next
//! request. A successful authentication resets the counter.
//!
//! ## Claim Projection
//!
//! Claims always go to the access token. `name`, `email`, and `role` claims are
//! also copied to the identity token when the matching `profile`, `email`, or
//! `roles` scope was granted. The security stamp is never projected.

pub mod api;
pub mod cli;
pub mod grant;
pub mod password;
pub mod signer;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
