//! Scope-based authorization of protected operations.
//!
//! Every operation is registered with an [`AccessRule`]: the policy of its
//! containing resource plus its own. [`ScopeAuthorizer::authorize`] decides
//! against the sealed [`UserContext`] of the request.

use portcullis_core::ScopeSet;

use crate::context::UserContext;
use crate::error::{AuthError, Result};

/// Access requirements declared on a resource or an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopePolicy {
    /// Allow everyone without looking at the caller.
    pub public: bool,
    /// Require an authenticated caller even when no scope is listed.
    pub requires_auth: bool,
    /// Scopes of which the caller must hold at least one.
    pub scopes: ScopeSet,
}

impl ScopePolicy {
    /// A policy with no requirement.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A fully public policy.
    #[must_use]
    pub fn public() -> Self {
        Self {
            public: true,
            ..Self::default()
        }
    }

    /// Any authenticated caller.
    #[must_use]
    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            ..Self::default()
        }
    }

    /// Callers holding one of `scopes`.
    #[must_use]
    pub fn scopes<S: Into<String>>(scopes: impl IntoIterator<Item = S>) -> Self {
        Self {
            requires_auth: true,
            scopes: scopes.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// The policies governing one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRule {
    /// Policy of the containing resource.
    pub resource: ScopePolicy,
    /// Policy of the operation itself.
    pub operation: ScopePolicy,
}

impl AccessRule {
    /// Combine a resource policy with an operation policy.
    #[must_use]
    pub const fn new(resource: ScopePolicy, operation: ScopePolicy) -> Self {
        Self {
            resource,
            operation,
        }
    }

    /// A rule for a fully public operation.
    #[must_use]
    pub fn public() -> Self {
        Self::new(ScopePolicy::none(), ScopePolicy::public())
    }

    /// Whether either level is public.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.resource.public || self.operation.public
    }

    /// Whether either level requires an authenticated caller.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.resource.requires_auth
            || self.operation.requires_auth
            || !self.resource.scopes.is_empty()
            || !self.operation.scopes.is_empty()
    }

    /// Union of the scopes declared at both levels.
    #[must_use]
    pub fn allowed_scopes(&self) -> ScopeSet {
        self.operation.scopes.union(&self.resource.scopes)
    }
}

/// Stateless gate applied before a protected operation runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeAuthorizer;

impl ScopeAuthorizer {
    /// Create an authorizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decide whether `context` may invoke an operation governed by `rule`.
    ///
    /// # Errors
    ///
    /// Returns `UnauthenticatedAccessDenied` for an anonymous caller of a
    /// protected operation and `ScopeAccessDenied` when the caller holds none
    /// of the allowed scopes.
    pub fn authorize(&self, rule: &AccessRule, context: &UserContext) -> Result<()> {
        if rule.is_public() || !rule.requires_auth() {
            return Ok(());
        }

        let Some(user) = context.user_name() else {
            tracing::debug!("Denying unauthenticated access");
            return Err(AuthError::UnauthenticatedAccessDenied);
        };

        let allowed = rule.allowed_scopes();
        if context.scopes_include_one_of(&allowed) {
            return Ok(());
        }

        tracing::info!(user = %user, allowed = %allowed, "Denying access for missing scope");
        Err(AuthError::ScopeAccessDenied {
            user: user.clone(),
            allowed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::UserName;

    fn user(scopes: &[&str]) -> UserContext {
        UserContext::authenticated(
            UserName::new("jane").unwrap(),
            scopes.iter().copied().collect(),
        )
    }

    fn access_key_read() -> AccessRule {
        AccessRule::new(
            ScopePolicy::scopes(["adm", "adm.accesskey"]),
            ScopePolicy::scopes(["adm.read", "adm.accesskey.read"]),
        )
    }

    #[test]
    fn public_allows_anyone() {
        let authorizer = ScopeAuthorizer::new();
        let rule = AccessRule::new(ScopePolicy::scopes(["adm"]), ScopePolicy::public());
        assert!(authorizer.authorize(&rule, &UserContext::unauthenticated()).is_ok());
        assert!(authorizer.authorize(&AccessRule::public(), &user(&[])).is_ok());
    }

    #[test]
    fn open_operation_allows_anonymous() {
        let authorizer = ScopeAuthorizer::new();
        let rule = AccessRule::default();
        assert!(authorizer.authorize(&rule, &UserContext::unauthenticated()).is_ok());
    }

    #[test]
    fn unauthenticated_is_denied() {
        let authorizer = ScopeAuthorizer::new();
        for rule in [
            AccessRule::new(ScopePolicy::authenticated(), ScopePolicy::none()),
            access_key_read(),
        ] {
            assert!(matches!(
                authorizer.authorize(&rule, &UserContext::unauthenticated()),
                Err(AuthError::UnauthenticatedAccessDenied)
            ));
        }
    }

    #[test]
    fn authenticated_without_declared_scopes() {
        let authorizer = ScopeAuthorizer::new();
        let rule = AccessRule::new(ScopePolicy::none(), ScopePolicy::authenticated());
        assert!(authorizer.authorize(&rule, &user(&[])).is_ok());
    }

    #[test]
    fn union_of_operation_and_resource_scopes() {
        let authorizer = ScopeAuthorizer::new();
        let rule = access_key_read();
        assert!(authorizer.authorize(&rule, &user(&["adm.read"])).is_ok());
        assert!(authorizer.authorize(&rule, &user(&["adm.accesskey"])).is_ok());
    }

    #[test]
    fn denial_lists_allowed_scopes_sorted() {
        let authorizer = ScopeAuthorizer::new();
        let err = authorizer
            .authorize(&access_key_read(), &user(&["ipam", "secret.scope"]))
            .unwrap_err();

        let AuthError::ScopeAccessDenied { user, allowed } = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(user.as_str(), "jane");
        assert_eq!(
            allowed.to_claim(),
            "adm adm.accesskey adm.accesskey.read adm.read"
        );
        assert!(!err.to_string().contains("secret.scope"));
    }
}
