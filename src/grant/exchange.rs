//! Password grant orchestration.
//!
//! `Received → Validating → {Failed | Authenticated} → Negotiating →
//! Projecting → IssuingHandoff → Done`. There are no retries: a failed request
//! returns its error and the client resubmits.

use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    AuthenticationTicket, ClaimProjector, Clock, CredentialValidator, GrantConfig, GrantError,
    ScopeNegotiator, principal_claims,
};
use crate::signer::{IssuedTokens, TokenSigner};
use crate::store::UserStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantType {
    Password,
    /// Recognized, but not handled by this service.
    RefreshToken,
    Unsupported(String),
}

impl From<&str> for GrantType {
    fn from(raw: &str) -> Self {
        match raw {
            "password" => Self::Password,
            "refresh_token" => Self::RefreshToken,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password => f.write_str("password"),
            Self::RefreshToken => f.write_str("refresh_token"),
            Self::Unsupported(raw) => f.write_str(raw),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TokenRequest {
    pub grant_type: GrantType,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub scopes: BTreeSet<String>,
    pub client_id: Option<String>,
}

impl TokenRequest {
    #[must_use]
    pub fn new(grant_type: GrantType) -> Self {
        Self {
            grant_type,
            username: None,
            password: None,
            scopes: BTreeSet::new(),
            client_id: None,
        }
    }

    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(SecretString::from(password.into())),
            ..Self::new(GrantType::Password)
        }
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// Stages of a single token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeStage {
    Received,
    Validating,
    Failed,
    Authenticated,
    Negotiating,
    Projecting,
    IssuingHandoff,
    Done,
}

impl ExchangeStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Failed => "failed",
            Self::Authenticated => "authenticated",
            Self::Negotiating => "negotiating",
            Self::Projecting => "projecting",
            Self::IssuingHandoff => "issuing_handoff",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ExchangeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed grant ready to be returned to the client.
#[derive(Debug)]
pub struct IssuedGrant {
    pub tokens: IssuedTokens,
    pub scopes: BTreeSet<String>,
}

pub struct TokenExchange {
    validator: CredentialValidator,
    negotiator: ScopeNegotiator,
    projector: ClaimProjector,
    resource: String,
    signer: Arc<dyn TokenSigner>,
}

impl TokenExchange {
    #[must_use]
    pub fn new(
        config: &GrantConfig,
        store: Arc<dyn UserStore>,
        signer: Arc<dyn TokenSigner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            validator: CredentialValidator::new(store, config.lockout(), clock),
            negotiator: ScopeNegotiator::new(config.allowed_scopes().clone()),
            projector: ClaimProjector::new(config.security_stamp_claim_type()),
            resource: config.resource().to_string(),
            signer,
        }
    }

    /// Validate the request and build its authentication ticket.
    ///
    /// # Errors
    /// `UnsupportedGrantType` for anything but `password` (no store access),
    /// `InvalidRequest` when credentials are missing, `InvalidGrant` for
    /// rejected credentials, `Store` for user store failures.
    #[instrument(skip_all, fields(grant_type = %request.grant_type))]
    pub async fn exchange(&self, request: &TokenRequest) -> Result<AuthenticationTicket, GrantError> {
        stage(ExchangeStage::Received);

        if request.grant_type != GrantType::Password {
            stage(ExchangeStage::Failed);
            return Err(GrantError::UnsupportedGrantType(
                request.grant_type.to_string(),
            ));
        }

        let username = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|username| !username.is_empty())
            .ok_or(GrantError::InvalidRequest(
                "The mandatory 'username' parameter is missing.",
            ))?;
        let password = request
            .password
            .as_ref()
            .filter(|password| !password.expose_secret().is_empty())
            .ok_or(GrantError::InvalidRequest(
                "The mandatory 'password' parameter is missing.",
            ))?;

        stage(ExchangeStage::Validating);
        let account = match self.validator.validate(username, password).await {
            Ok(account) => account,
            Err(err) => {
                stage(ExchangeStage::Failed);
                return Err(err);
            }
        };
        stage(ExchangeStage::Authenticated);

        stage(ExchangeStage::Negotiating);
        let granted = self.negotiator.negotiate(&request.scopes);

        stage(ExchangeStage::Projecting);
        let claims = self.projector.project(&principal_claims(&account), &granted);

        Ok(AuthenticationTicket::new(
            claims,
            granted,
            self.resource.clone(),
            request.client_id.clone(),
        ))
    }

    /// Run [`Self::exchange`] and hand the ticket to the token signer.
    ///
    /// # Errors
    /// Any error from `exchange`, or `Signer` if issuance fails.
    #[instrument(skip_all, fields(grant_type = %request.grant_type))]
    pub async fn issue(&self, request: &TokenRequest) -> Result<IssuedGrant, GrantError> {
        let ticket = self.exchange(request).await?;

        stage(ExchangeStage::IssuingHandoff);
        let tokens = self.signer.issue(&ticket).await.inspect_err(|_| {
            stage(ExchangeStage::Failed);
        })?;
        stage(ExchangeStage::Done);

        Ok(IssuedGrant {
            tokens,
            scopes: ticket.scopes().clone(),
        })
    }
}

fn stage(stage: ExchangeStage) {
    debug!(stage = %stage, "Token exchange stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{
        AccountId, AccountRecord, ClaimType, Destination, FailureReason, ManualClock,
    };
    use crate::password::hash_password;
    use crate::signer::SignerError;
    use crate::store::MemoryUserStore;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSigner {
        tickets: Mutex<Vec<AuthenticationTicket>>,
        fail: bool,
    }

    #[async_trait]
    impl TokenSigner for RecordingSigner {
        async fn issue(&self, ticket: &AuthenticationTicket) -> Result<IssuedTokens, SignerError> {
            if self.fail {
                return Err(SignerError::MissingSubject);
            }
            if let Ok(mut tickets) = self.tickets.lock() {
                tickets.push(ticket.clone());
            }
            Ok(IssuedTokens {
                access_token: "access".to_string(),
                id_token: ticket.has_scope("openid").then(|| "id".to_string()),
                expires_in: 3600,
            })
        }
    }

    async fn exchange_with(signer: Arc<RecordingSigner>) -> Result<(TokenExchange, Arc<MemoryUserStore>)> {
        let params = argon2::Params::new(8, 1, 1, None).map_err(|e| anyhow!(e.to_string()))?;
        let hash = hash_password("correct", params).map_err(|e| anyhow!(e.to_string()))?;
        let store = Arc::new(MemoryUserStore::new());
        store
            .insert(
                AccountRecord::new(
                    AccountId::new(Uuid::new_v4()),
                    "alice".to_string(),
                    "alice@example.com".to_string(),
                    hash,
                )
                .with_roles(["admin"]),
            )
            .await;

        let config = GrantConfig::new("api.example".to_string());
        let exchange = TokenExchange::new(
            &config,
            store.clone(),
            signer,
            Arc::new(ManualClock::new(Utc::now())),
        );
        Ok((exchange, store))
    }

    fn destinations(ticket: &AuthenticationTicket, kind: &ClaimType) -> Option<BTreeSet<Destination>> {
        ticket
            .claims()
            .iter()
            .find(|claim| claim.kind() == kind)
            .map(|claim| claim.destinations().clone())
    }

    #[test]
    fn grant_type_parsing() {
        assert_eq!(GrantType::from("password"), GrantType::Password);
        assert_eq!(GrantType::from("refresh_token"), GrantType::RefreshToken);
        assert_eq!(
            GrantType::from("authorization_code"),
            GrantType::Unsupported("authorization_code".to_string())
        );
        assert_eq!(GrantType::from("Password").to_string(), "Password");
    }

    #[tokio::test]
    async fn password_grant_builds_ticket() -> Result<()> {
        let (exchange, _store) = exchange_with(Arc::new(RecordingSigner::default())).await?;
        let request = TokenRequest::password("alice", "correct")
            .with_scopes(["openid", "profile", "offline_access"])
            .with_client_id("spa");

        let ticket = exchange.exchange(&request).await?;
        assert_eq!(ticket.resource(), "api.example");
        assert_eq!(ticket.presenter(), Some("spa"));
        assert_eq!(
            ticket.scopes().iter().map(String::as_str).collect::<Vec<_>>(),
            ["openid", "profile"]
        );
        assert!(ticket.subject().is_some());
        assert_eq!(
            destinations(&ticket, &ClaimType::Name),
            Some(BTreeSet::from([Destination::AccessToken, Destination::IdentityToken]))
        );
        assert_eq!(
            destinations(&ticket, &ClaimType::Email),
            Some(BTreeSet::from([Destination::AccessToken]))
        );
        assert_eq!(
            destinations(&ticket, &ClaimType::Role),
            Some(BTreeSet::from([Destination::AccessToken]))
        );
        assert!(destinations(&ticket, &ClaimType::SecurityStamp).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_grant_skips_store() -> Result<()> {
        let (exchange, store) = exchange_with(Arc::new(RecordingSigner::default())).await?;
        for grant_type in ["authorization_code", "refresh_token"] {
            let mut request = TokenRequest::password("alice", "correct");
            request.grant_type = GrantType::from(grant_type);
            let err = exchange
                .exchange(&request)
                .await
                .err()
                .ok_or_else(|| anyhow!("expected failure"))?;
            assert_eq!(err.code(), "unsupported_grant_type");
        }
        assert_eq!(store.lookup_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_credentials_are_invalid_requests() -> Result<()> {
        let (exchange, store) = exchange_with(Arc::new(RecordingSigner::default())).await?;

        let mut request = TokenRequest::password("alice", "correct");
        request.username = None;
        let err = exchange.exchange(&request).await.err();
        assert_eq!(err.map(|e| e.code()), Some("invalid_request"));

        let request = TokenRequest::password("alice", "");
        let err = exchange.exchange(&request).await.err();
        assert_eq!(err.map(|e| e.code()), Some("invalid_request"));

        assert_eq!(store.lookup_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_grant() -> Result<()> {
        let signer = Arc::new(RecordingSigner::default());
        let (exchange, _store) = exchange_with(signer.clone()).await?;
        let err = exchange
            .issue(&TokenRequest::password("alice", "wrong"))
            .await
            .err()
            .ok_or_else(|| anyhow!("expected failure"))?;
        assert_eq!(err.failure_reason(), Some(FailureReason::BadPassword));
        assert!(signer.tickets.lock().map(|t| t.is_empty()).unwrap_or(false));
        Ok(())
    }

    #[tokio::test]
    async fn issue_hands_ticket_to_signer() -> Result<()> {
        let signer = Arc::new(RecordingSigner::default());
        let (exchange, _store) = exchange_with(signer.clone()).await?;

        let grant = exchange
            .issue(&TokenRequest::password("alice", "correct").with_scopes(["openid"]))
            .await?;
        assert_eq!(grant.tokens.access_token, "access");
        assert_eq!(grant.tokens.id_token.as_deref(), Some("id"));
        assert_eq!(grant.scopes.len(), 1);
        assert_eq!(signer.tickets.lock().map(|t| t.len()).unwrap_or(0), 1);
        Ok(())
    }

    #[tokio::test]
    async fn signer_failure_is_server_error() -> Result<()> {
        let signer = Arc::new(RecordingSigner {
            fail: true,
            ..RecordingSigner::default()
        });
        let (exchange, _store) = exchange_with(signer).await?;
        let err = exchange
            .issue(&TokenRequest::password("alice", "correct"))
            .await
            .err()
            .ok_or_else(|| anyhow!("expected failure"))?;
        assert_eq!(err.code(), "server_error");
        Ok(())
    }
}
