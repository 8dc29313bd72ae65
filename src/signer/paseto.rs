//! PASETO `v4.public` token signer.
//!
//! Tokens are `v4.public.<base64url(payload || signature)>.<base64url(footer)>`
//! where the signature is Ed25519 over `PAE(header, payload, footer, "")`.

use async_trait::async_trait;
use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use ulid::Ulid;

use super::{IssuedTokens, SignerError, TokenSigner};
use crate::grant::{AuthenticationTicket, ClaimType, Clock, Destination, format_scopes, scopes};

const HEADER: &str = "v4.public.";
const PASERK_PUBLIC_PREFIX: &str = "k4.public.";
const KEYSET_VERSION: &str = "v4";
const KEYSET_PURPOSE: &str = "public";

/// Payload keys the signer owns; projected claims never override them.
const RESERVED_CLAIMS: [&str; 8] = ["iss", "aud", "sub", "iat", "exp", "nbf", "jti", "scope"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenFooter {
    pub kid: String,
}

/// Public keys published at `/paserk.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct PublicKeySet {
    pub version: String,
    pub purpose: String,
    pub active_kid: String,
    pub keys: Vec<PublicKeySetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct PublicKeySetEntry {
    pub kid: String,
    pub paserk: String,
}

impl PublicKeySet {
    /// Serialize this keyset to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct PasetoSigner {
    signing_key: SigningKey,
    kid: String,
    issuer: String,
    access_token_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PasetoSigner {
    #[must_use]
    pub fn new(
        signing_key: SigningKey,
        kid: String,
        issuer: String,
        access_token_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signing_key,
            kid,
            issuer,
            access_token_ttl,
            clock,
        }
    }

    /// Decode a standard base64 Ed25519 seed (32 bytes).
    ///
    /// # Errors
    /// Returns an error if the content is not base64 or not 32 bytes long.
    pub fn signing_key_from_base64(seed_b64: &str) -> Result<SigningKey, SignerError> {
        let raw = Base64::decode_vec(seed_b64.trim())
            .map_err(|_| SignerError::Key("signing key is not valid base64".to_string()))?;
        let seed: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
            SignerError::Key(format!("signing key must be 32 bytes, got {}", raw.len()))
        })?;
        Ok(SigningKey::from_bytes(&seed))
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The verifying key as a PASERK `k4.public` string.
    #[must_use]
    pub fn public_paserk(&self) -> String {
        let public = self.signing_key.verifying_key();
        format!(
            "{PASERK_PUBLIC_PREFIX}{}",
            Base64UrlUnpadded::encode_string(public.as_bytes())
        )
    }

    #[must_use]
    pub fn public_key_set(&self) -> PublicKeySet {
        PublicKeySet {
            version: KEYSET_VERSION.to_string(),
            purpose: KEYSET_PURPOSE.to_string(),
            active_kid: self.kid.clone(),
            keys: vec![PublicKeySetEntry {
                kid: self.kid.clone(),
                paserk: self.public_paserk(),
            }],
        }
    }

    fn sign(&self, payload: &Map<String, Value>) -> Result<String, SignerError> {
        let payload = serde_json::to_vec(payload)?;
        let footer = serde_json::to_vec(&TokenFooter {
            kid: self.kid.clone(),
        })?;
        let pre_auth = pae(&[HEADER.as_bytes(), &payload, &footer, b""])?;
        let signature = self.signing_key.sign(&pre_auth).to_bytes();
        Ok(build_token(&payload, &footer, &signature))
    }
}

#[async_trait]
impl TokenSigner for PasetoSigner {
    async fn issue(&self, ticket: &AuthenticationTicket) -> Result<IssuedTokens, SignerError> {
        let subject = ticket.subject().ok_or(SignerError::MissingSubject)?;
        let ttl = TimeDelta::from_std(self.access_token_ttl).map_err(|_| SignerError::Lifetime)?;
        let issued_at = self.clock.now();
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(SignerError::Lifetime)?;

        let mut access = registered_claims(
            &self.issuer,
            ticket.resource(),
            subject,
            issued_at,
            expires_at,
        );
        access.insert(
            "scope".to_string(),
            Value::String(format_scopes(ticket.scopes())),
        );
        add_projected_claims(&mut access, ticket, Destination::AccessToken);
        let access_token = self.sign(&access)?;

        let id_token = if ticket.has_scope(scopes::OPENID) {
            let audience = ticket.presenter().unwrap_or(ticket.resource());
            let mut identity =
                registered_claims(&self.issuer, audience, subject, issued_at, expires_at);
            add_projected_claims(&mut identity, ticket, Destination::IdentityToken);
            Some(self.sign(&identity)?)
        } else {
            None
        };

        debug!(
            kid = %self.kid,
            id_token = id_token.is_some(),
            "Issued tokens"
        );

        Ok(IssuedTokens {
            access_token,
            id_token,
            expires_in: self.access_token_ttl.as_secs(),
        })
    }
}

fn registered_claims(
    issuer: &str,
    audience: &str,
    subject: &str,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("iss".to_string(), Value::from(issuer));
    payload.insert("aud".to_string(), Value::from(audience));
    payload.insert("sub".to_string(), Value::from(subject));
    payload.insert(
        "iat".to_string(),
        Value::from(issued_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    payload.insert(
        "exp".to_string(),
        Value::from(expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    payload.insert("jti".to_string(), Value::from(Ulid::new().to_string()));
    payload
}

fn add_projected_claims(
    payload: &mut Map<String, Value>,
    ticket: &AuthenticationTicket,
    destination: Destination,
) {
    for claim in ticket.claims_for(destination) {
        let key = claim.kind().as_str();
        if *claim.kind() == ClaimType::Subject || RESERVED_CLAIMS.contains(&key) {
            continue;
        }
        let value = Value::from(claim.value());
        match payload.get_mut(key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None if *claim.kind() == ClaimType::Role => {
                payload.insert(key.to_string(), Value::Array(vec![value]));
            }
            None => {
                payload.insert(key.to_string(), value);
            }
        }
    }
}

/// Build a v4.public token from payload, footer, and Ed25519 signature.
#[must_use]
pub fn build_token(payload: &[u8], footer: &[u8], signature: &[u8; 64]) -> String {
    let mut message = Vec::with_capacity(payload.len() + signature.len());
    message.extend_from_slice(payload);
    message.extend_from_slice(signature);
    let body_b64 = Base64UrlUnpadded::encode_string(&message);
    if footer.is_empty() {
        format!("{HEADER}{body_b64}")
    } else {
        let footer_b64 = Base64UrlUnpadded::encode_string(footer);
        format!("{HEADER}{body_b64}.{footer_b64}")
    }
}

/// Pre-authentication encoding.
fn pae(pieces: &[&[u8]]) -> Result<Vec<u8>, SignerError> {
    let count = u64::try_from(pieces.len()).map_err(|_| SignerError::Oversized)?;
    let mut out = Vec::new();
    out.extend_from_slice(&le64(count));
    for piece in pieces {
        let len = u64::try_from(piece.len()).map_err(|_| SignerError::Oversized)?;
        out.extend_from_slice(&le64(len));
        out.extend_from_slice(piece);
    }
    Ok(out)
}

fn le64(mut value: u64) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, byte) in out.iter_mut().enumerate() {
        if i == 7 {
            value &= 0x7f;
        }
        *byte = (value & 0xff) as u8;
        value >>= 8;
    }
    out
}
