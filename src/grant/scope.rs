use std::collections::BTreeSet;

/// Intersects requested scopes with the configured allowed set.
///
/// Unsupported scopes are dropped, never rejected.
#[derive(Clone, Debug)]
pub struct ScopeNegotiator {
    allowed: BTreeSet<String>,
}

impl ScopeNegotiator {
    #[must_use]
    pub fn new(allowed: BTreeSet<String>) -> Self {
        Self { allowed }
    }

    #[must_use]
    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    #[must_use]
    pub fn negotiate(&self, requested: &BTreeSet<String>) -> BTreeSet<String> {
        requested.intersection(&self.allowed).cloned().collect()
    }
}

/// Split a space-delimited `scope` parameter. Scope tokens are case-sensitive.
#[must_use]
pub fn parse_scopes(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(ToString::to_string).collect()
}

#[must_use]
pub fn format_scopes(scopes: &BTreeSet<String>) -> String {
    scopes
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}
