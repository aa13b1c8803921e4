//! Credential validators and the chain running them.
//!
//! Each [`AccessTokenValidator`] looks for one credential form. The
//! [`ValidatorChain`] asks them in a fixed order; the first verdict other
//! than [`Verdict::NotApplicable`] decides the request.

use std::sync::Arc;

use async_trait::async_trait;

use portcullis_core::{ScopeSet, UserName};

use crate::claims::Claims;
use crate::context::UserContext;
use crate::error::{AuthError, Result};
use crate::request::{AuthRequest, ResponseCookies};

/// Claim preferred over `sub` as principal name.
pub const PREFERRED_USERNAME_CLAIM: &str = "preferred_username";

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The user the request acts as.
    pub user_name: UserName,
    /// Scopes granted to the request.
    pub scopes: ScopeSet,
}

impl Principal {
    /// Create a principal.
    #[must_use]
    pub const fn new(user_name: UserName, scopes: ScopeSet) -> Self {
        Self { user_name, scopes }
    }

    /// The principal named by a token, preferring `preferred_username` over `sub`.
    ///
    /// Returns `None` if neither claim holds a valid user name.
    #[must_use]
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        let name = claims
            .claim_str(PREFERRED_USERNAME_CLAIM)
            .or_else(|| claims.subject())?;
        let user_name = UserName::new(name).ok()?;
        Some(Self::new(user_name, claims.scopes().clone()))
    }
}

/// Outcome of a single validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No credential of this validator's kind was present.
    NotApplicable,
    /// A credential was present and did not validate.
    Invalid,
    /// The credential authenticates this principal.
    Valid(Principal),
}

impl Verdict {
    /// Shorthand for a valid verdict.
    #[must_use]
    pub const fn valid(user_name: UserName, scopes: ScopeSet) -> Self {
        Self::Valid(Principal::new(user_name, scopes))
    }
}

/// A strategy for authenticating requests.
#[async_trait]
pub trait AccessTokenValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Inspect `request` for this validator's credential.
    ///
    /// Cookies to be set on the response are added to `cookies`.
    ///
    /// # Errors
    ///
    /// Returns an error only when a collaborator fails. Bad credentials are
    /// reported as [`Verdict::Invalid`].
    async fn validate(&self, request: &AuthRequest, cookies: &mut ResponseCookies)
        -> Result<Verdict>;
}

/// Ordered list of validators.
#[derive(Clone, Default)]
pub struct ValidatorChain {
    validators: Vec<Arc<dyn AccessTokenValidator>>,
}

impl ValidatorChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator.
    #[must_use]
    pub fn with(mut self, validator: Arc<dyn AccessTokenValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Append a validator if present.
    #[must_use]
    pub fn with_optional(self, validator: Option<Arc<dyn AccessTokenValidator>>) -> Self {
        match validator {
            Some(v) => self.with(v),
            None => self,
        }
    }

    /// Validator names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Authenticate `request`.
    ///
    /// Returns a sealed authenticated context for the first valid verdict,
    /// or a sealed unauthenticated context when no validator applies.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredential` as soon as a validator rejects its
    /// credential; later validators are not consulted. Collaborator errors
    /// propagate.
    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        cookies: &mut ResponseCookies,
    ) -> Result<UserContext> {
        for validator in &self.validators {
            match validator.validate(request, cookies).await? {
                Verdict::NotApplicable => {}
                Verdict::Invalid => {
                    tracing::debug!(
                        validator = validator.name(),
                        path = %request.path(),
                        "Credential rejected"
                    );
                    return Err(AuthError::InvalidCredential);
                }
                Verdict::Valid(principal) => {
                    tracing::debug!(
                        validator = validator.name(),
                        user = %principal.user_name,
                        "Request authenticated"
                    );
                    let mut context = UserContext::new();
                    context.set_user_name(principal.user_name)?;
                    context.set_scopes(principal.scopes)?;
                    context.seal();
                    return Ok(context);
                }
            }
        }
        Ok(UserContext::unauthenticated())
    }
}

impl std::fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
