//! Token issuance for authenticated tickets.

pub mod paseto;

pub use paseto::{PasetoSigner, PublicKeySet, PublicKeySetEntry};

use async_trait::async_trait;

use crate::grant::AuthenticationTicket;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("failed to encode token: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("ticket has no subject claim")]
    MissingSubject,
    #[error("token lifetime is out of range")]
    Lifetime,
    #[error("token piece is too large to encode")]
    Oversized,
    #[error("invalid signing key: {0}")]
    Key(String),
}

/// Tokens produced for one ticket.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub id_token: Option<String>,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl std::fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("access_token", &"***")
            .field("id_token", &self.id_token.as_ref().map(|_| "***"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[async_trait]
pub trait TokenSigner: Send + Sync {
    /// Sign the tokens described by `ticket`.
    async fn issue(&self, ticket: &AuthenticationTicket) -> Result<IssuedTokens, SignerError>;
}
