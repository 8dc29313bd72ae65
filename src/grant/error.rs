//! Grant failures and their OAuth2 error codes.

use std::fmt;

use crate::signer::SignerError;
use crate::store::StoreError;

/// The only description a client ever sees for a rejected password grant.
pub const INVALID_GRANT_DESCRIPTION: &str = "The username/password couple is invalid.";
pub const UNSUPPORTED_GRANT_TYPE_DESCRIPTION: &str = "The specified grant type is not supported.";
const SERVER_ERROR_DESCRIPTION: &str = "The token request could not be processed.";

/// Why a password grant was rejected. Logged, never returned to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    UnknownAccount,
    SignInNotAllowed,
    LockedOut,
    BadPassword,
}

impl FailureReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownAccount => "unknown_account",
            Self::SignInNotAllowed => "sign_in_not_allowed",
            Self::LockedOut => "locked_out",
            Self::BadPassword => "bad_password",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("invalid grant: {0}")]
    InvalidGrant(FailureReason),
    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("user store failure: {0}")]
    Store(#[from] StoreError),
    #[error("token issuance failure: {0}")]
    Signer(#[from] SignerError),
}

impl GrantError {
    /// OAuth2 `error` code for the response body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Store(_) | Self::Signer(_) => "server_error",
        }
    }

    /// OAuth2 `error_description` for the response body.
    ///
    /// Every `InvalidGrant` reason maps to the same text.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidGrant(_) => INVALID_GRANT_DESCRIPTION,
            Self::UnsupportedGrantType(_) => UNSUPPORTED_GRANT_TYPE_DESCRIPTION,
            Self::InvalidRequest(message) => *message,
            Self::Store(_) | Self::Signer(_) => SERVER_ERROR_DESCRIPTION,
        }
    }

    /// `true` when the client caused the failure, `false` for infrastructure errors.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Signer(_))
    }

    #[must_use]
    pub const fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::InvalidGrant(reason) => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_grant_reasons_are_indistinguishable() {
        let reasons = [
            FailureReason::UnknownAccount,
            FailureReason::SignInNotAllowed,
            FailureReason::LockedOut,
            FailureReason::BadPassword,
        ];
        for reason in reasons {
            let err = GrantError::InvalidGrant(reason);
            assert_eq!(err.code(), "invalid_grant");
            assert_eq!(err.description(), INVALID_GRANT_DESCRIPTION);
            assert!(err.is_client_error());
            assert_eq!(err.failure_reason(), Some(reason));
        }
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = GrantError::from(StoreError::InvalidRecord("bad row".to_string()));
        assert_eq!(err.code(), "server_error");
        assert!(!err.is_client_error());
        assert!(!err.description().contains("bad row"));
    }

    #[test]
    fn unsupported_grant_type_code() {
        let err = GrantError::UnsupportedGrantType("authorization_code".to_string());
        assert_eq!(err.code(), "unsupported_grant_type");
        assert_eq!(err.description(), UNSUPPORTED_GRANT_TYPE_DESCRIPTION);
    }
}
