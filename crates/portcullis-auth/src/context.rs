//! Per-request user context.

use portcullis_core::{ScopeSet, UserName};

use crate::error::{AuthError, Result};

/// The identity a request was authenticated as.
///
/// Writable until [`UserContext::seal`] is called, read-only afterwards.
/// A context without a user name is unauthenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    user_name: Option<UserName>,
    scopes: ScopeSet,
    sealed: bool,
}

impl UserContext {
    /// Create an empty, unsealed context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sealed context for an authenticated principal.
    #[must_use]
    pub fn authenticated(user_name: UserName, scopes: ScopeSet) -> Self {
        Self {
            user_name: Some(user_name),
            scopes,
            sealed: true,
        }
    }

    /// A sealed context for a request that carried no credential.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            sealed: true,
            ..Self::default()
        }
    }

    /// Set the user name.
    ///
    /// # Errors
    ///
    /// Returns `ContextSealed` once the context is sealed.
    pub fn set_user_name(&mut self, user_name: UserName) -> Result<()> {
        self.ensure_open()?;
        self.user_name = Some(user_name);
        Ok(())
    }

    /// Replace the granted scopes.
    ///
    /// # Errors
    ///
    /// Returns `ContextSealed` once the context is sealed.
    pub fn set_scopes(&mut self, scopes: ScopeSet) -> Result<()> {
        self.ensure_open()?;
        self.scopes = scopes;
        Ok(())
    }

    /// Freeze the context. Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether the context is frozen.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Whether no user name has been set.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        self.user_name.is_none()
    }

    /// The authenticated user, if any.
    #[must_use]
    pub const fn user_name(&self) -> Option<&UserName> {
        self.user_name.as_ref()
    }

    /// Granted scopes. Always empty for an unauthenticated context.
    #[must_use]
    pub fn scopes(&self) -> &ScopeSet {
        const EMPTY: &ScopeSet = &ScopeSet::new();
        if self.is_unauthenticated() {
            EMPTY
        } else {
            &self.scopes
        }
    }

    /// Whether any of `required` is granted.
    ///
    /// An empty requirement is satisfied by every context, authenticated or
    /// not. Denying unauthenticated callers is the authorizer's job.
    #[must_use]
    pub fn scopes_include_one_of(&self, required: &ScopeSet) -> bool {
        required.is_empty() || self.scopes().intersects(required)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sealed {
            Err(AuthError::ContextSealed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> UserName {
        UserName::new("jane").unwrap()
    }

    fn scopes(list: &[&str]) -> ScopeSet {
        list.iter().copied().collect()
    }

    #[test]
    fn writable_until_sealed() {
        let mut ctx = UserContext::new();
        assert!(ctx.is_unauthenticated());

        ctx.set_user_name(jane()).unwrap();
        ctx.set_scopes(scopes(&["a"])).unwrap();
        ctx.set_scopes(scopes(&["a", "b"])).unwrap();
        ctx.seal();

        assert!(ctx.is_sealed());
        assert!(matches!(
            ctx.set_user_name(UserName::new("john").unwrap()),
            Err(AuthError::ContextSealed)
        ));
        assert!(matches!(
            ctx.set_scopes(ScopeSet::new()),
            Err(AuthError::ContextSealed)
        ));
        assert_eq!(ctx.user_name(), Some(&jane()));
        assert_eq!(ctx.scopes(), &scopes(&["a", "b"]));
    }

    #[test]
    fn scope_intersection() {
        let ctx = UserContext::authenticated(jane(), scopes(&["a", "b"]));
        assert!(ctx.scopes_include_one_of(&scopes(&["a", "c"])));
        assert!(!ctx.scopes_include_one_of(&scopes(&["c", "d"])));
        assert!(ctx.scopes_include_one_of(&ScopeSet::new()));
    }

    #[test]
    fn unauthenticated_context_holds_no_scopes() {
        let mut ctx = UserContext::new();
        ctx.set_scopes(scopes(&["a"])).unwrap();
        ctx.seal();

        assert!(ctx.scopes().is_empty());
        assert!(!ctx.scopes_include_one_of(&scopes(&["a"])));
        // The zero-length probe passes; the authorizer still denies.
        assert!(ctx.scopes_include_one_of(&ScopeSet::new()));
    }

    #[test]
    fn constructors_are_sealed() {
        assert!(UserContext::unauthenticated().is_sealed());
        assert!(UserContext::unauthenticated().is_unauthenticated());
        assert!(UserContext::authenticated(jane(), ScopeSet::new()).is_sealed());
    }
}
