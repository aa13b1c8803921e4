//! Scope sets.
//!
//! A scope is a named permission string. Scopes travel in tokens as a single
//! space-separated `scope` claim and are compared as an ordered set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An ordered, duplicate-free set of scopes.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Create an empty scope set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a space-separated scope claim. Empty segments are skipped.
    #[must_use]
    pub fn from_claim(claim: &str) -> Self {
        claim.split_whitespace().collect()
    }

    /// Render the set as a space-separated scope claim.
    #[must_use]
    pub fn to_claim(&self) -> String {
        self.0.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }

    /// Add a scope.
    pub fn insert(&mut self, scope: impl Into<String>) {
        self.0.insert(scope.into());
    }

    /// Whether the set contains `scope`.
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Whether at least one scope is shared with `other`.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        // Walk the smaller set.
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.0.iter().any(|s| large.0.contains(s))
    }

    /// Union of both sets.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Number of scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the scopes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Debug for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for ScopeSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for ScopeSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_roundtrip_is_sorted() {
        let scopes = ScopeSet::from_claim("ipam  adm\tadm.read ");
        assert_eq!(scopes.len(), 3);
        assert_eq!(scopes.to_claim(), "adm adm.read ipam");
    }

    #[test]
    fn empty_claim_yields_empty_set() {
        assert!(ScopeSet::from_claim("").is_empty());
        assert_eq!(ScopeSet::new().to_claim(), "");
    }

    #[test]
    fn intersection() {
        let granted: ScopeSet = ["a", "b"].into_iter().collect();
        let required: ScopeSet = ["a", "c"].into_iter().collect();
        let other: ScopeSet = ["c", "d"].into_iter().collect();

        assert!(granted.intersects(&required));
        assert!(required.intersects(&granted));
        assert!(!granted.intersects(&other));
        assert!(!granted.intersects(&ScopeSet::new()));
    }

    #[test]
    fn union_and_display() {
        let method: ScopeSet = ["adm.read"].into_iter().collect();
        let resource: ScopeSet = ["adm", "adm.accesskey"].into_iter().collect();
        let all = method.union(&resource);
        assert_eq!(all.to_string(), "adm, adm.accesskey, adm.read");
    }

    #[test]
    fn serde_as_list() {
        let scopes: ScopeSet = ["b", "a"].into_iter().collect();
        let json = serde_json::to_string(&scopes).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let parsed: ScopeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, scopes);
    }
}
