//! Principal claims and their token destinations.

use secrecy::ExposeSecret;
use std::collections::BTreeSet;
use std::fmt;

use super::{AccountRecord, scopes};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClaimType {
    Subject,
    Name,
    Email,
    Role,
    SecurityStamp,
    Custom(String),
}

impl ClaimType {
    /// Map a wire claim name onto the known vocabulary.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "sub" => Self::Subject,
            "name" => Self::Name,
            "email" => Self::Email,
            "role" => Self::Role,
            other => Self::Custom(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Subject => "sub",
            Self::Name => "name",
            Self::Email => "email",
            Self::Role => "role",
            Self::SecurityStamp => "security_stamp",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    AccessToken,
    IdentityToken,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Claim {
    kind: ClaimType,
    value: String,
    destinations: BTreeSet<Destination>,
}

impl Claim {
    /// A claim not yet routed to any token.
    #[must_use]
    pub fn new(kind: ClaimType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            destinations: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &ClaimType {
        &self.kind
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn destinations(&self) -> &BTreeSet<Destination> {
        &self.destinations
    }

    #[must_use]
    pub fn has_destination(&self, destination: Destination) -> bool {
        self.destinations.contains(&destination)
    }

    fn routed(&self, destinations: BTreeSet<Destination>) -> Self {
        Self {
            kind: self.kind.clone(),
            value: self.value.clone(),
            destinations,
        }
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.kind == ClaimType::SecurityStamp {
            "***"
        } else {
            self.value.as_str()
        };
        f.debug_struct("Claim")
            .field("kind", &self.kind)
            .field("value", &value)
            .field("destinations", &self.destinations)
            .finish()
    }
}

/// Claims describing `account`: subject, name, email, one claim per role,
/// the security stamp, then any store-provided claims.
#[must_use]
pub fn principal_claims(account: &AccountRecord) -> Vec<Claim> {
    let mut claims = vec![
        Claim::new(ClaimType::Subject, account.id.to_string()),
        Claim::new(ClaimType::Name, account.username.clone()),
        Claim::new(ClaimType::Email, account.email.clone()),
    ];
    claims.extend(
        account
            .roles
            .iter()
            .map(|role| Claim::new(ClaimType::Role, role.clone())),
    );
    claims.push(Claim::new(
        ClaimType::SecurityStamp,
        account.security_stamp.expose_secret(),
    ));
    claims.extend(
        account
            .claims
            .iter()
            .map(|(kind, value)| Claim::new(ClaimType::parse(kind), value.clone())),
    );
    claims
}

/// Decides which issued token each claim belongs in.
#[derive(Clone, Debug)]
pub struct ClaimProjector {
    security_stamp_claim_type: String,
}

impl ClaimProjector {
    #[must_use]
    pub fn new(security_stamp_claim_type: impl Into<String>) -> Self {
        Self {
            security_stamp_claim_type: security_stamp_claim_type.into(),
        }
    }

    /// Route each claim, dropping security stamps.
    ///
    /// Returns a new collection; the input is left untouched.
    #[must_use]
    pub fn project(&self, claims: &[Claim], granted: &BTreeSet<String>) -> Vec<Claim> {
        claims
            .iter()
            .filter(|claim| !self.is_security_stamp(claim.kind()))
            .map(|claim| claim.routed(destinations_for(claim.kind(), granted)))
            .collect()
    }

    fn is_security_stamp(&self, kind: &ClaimType) -> bool {
        match kind {
            ClaimType::SecurityStamp => true,
            ClaimType::Custom(name) => *name == self.security_stamp_claim_type,
            _ => false,
        }
    }
}

fn destinations_for(kind: &ClaimType, granted: &BTreeSet<String>) -> BTreeSet<Destination> {
    let mut destinations = BTreeSet::from([Destination::AccessToken]);
    let identity_scope = match kind {
        ClaimType::Name => Some(scopes::PROFILE),
        ClaimType::Email => Some(scopes::EMAIL),
        ClaimType::Role => Some(scopes::ROLES),
        _ => None,
    };
    if identity_scope.is_some_and(|scope| granted.contains(scope)) {
        destinations.insert(Destination::IdentityToken);
    }
    destinations
}
