use std::collections::BTreeSet;

use super::{Claim, ClaimType, Destination};

/// Everything the token signer needs for one successful grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationTicket {
    claims: Vec<Claim>,
    scopes: BTreeSet<String>,
    resource: String,
    presenter: Option<String>,
}

impl AuthenticationTicket {
    #[must_use]
    pub fn new(
        claims: Vec<Claim>,
        scopes: BTreeSet<String>,
        resource: String,
        presenter: Option<String>,
    ) -> Self {
        Self {
            claims,
            scopes,
            resource,
            presenter,
        }
    }

    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    #[must_use]
    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Client that requested the grant, when it identified itself.
    #[must_use]
    pub fn presenter(&self) -> Option<&str> {
        self.presenter.as_deref()
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| *claim.kind() == ClaimType::Subject)
            .map(Claim::value)
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn claims_for(&self, destination: Destination) -> impl Iterator<Item = &Claim> {
        self.claims
            .iter()
            .filter(move |claim| claim.has_destination(destination))
    }
}
