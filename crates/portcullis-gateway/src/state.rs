//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use portcullis_auth::{
    AuthConfig, IdentityStore, ScopeAuthorizer, StandaloneCookieValidator, TrustedKeyRegistry,
    UserRegistry, ValidatorChain,
};
use portcullis_control::AccessKeyControl;

use crate::config::GatewayConfig;

/// The authentication engine as wired at start-up.
pub struct AuthComponents {
    /// Authentication settings.
    pub config: Arc<AuthConfig>,
    /// Validators in evaluation order.
    pub chain: ValidatorChain,
    /// Per-operation scope checks.
    pub authorizer: ScopeAuthorizer,
    /// Keys accepted for bearer tokens, published as JWKS.
    pub trusted_keys: Arc<TrustedKeyRegistry>,
    /// Issues login cookies. Absent when OIDC is enabled.
    pub standalone: Option<Arc<StandaloneCookieValidator>>,
    /// Password verification for the standalone login.
    pub identities: Arc<dyn IdentityStore>,
    /// Current user scopes.
    pub users: Arc<dyn UserRegistry>,
}

impl std::fmt::Debug for AuthComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthComponents")
            .field("chain", &self.chain)
            .field("trusted_keys", &self.trusted_keys.key_ids())
            .field("standalone", &self.standalone.is_some())
            .finish_non_exhaustive()
    }
}

/// Shared application state for the gateway.
///
/// This struct holds references to all services needed by the HTTP handlers.
pub struct GatewayState<C>
where
    C: AccessKeyControl,
{
    /// Access-key management.
    pub access_keys: Arc<C>,
    /// Authentication and authorization.
    pub auth: Arc<AuthComponents>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<C> GatewayState<C>
where
    C: AccessKeyControl,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(access_keys: Arc<C>, auth: Arc<AuthComponents>, config: GatewayConfig) -> Self {
        Self {
            access_keys,
            auth,
            config,
        }
    }
}

impl<C> Clone for GatewayState<C>
where
    C: AccessKeyControl,
{
    fn clone(&self) -> Self {
        Self {
            access_keys: Arc::clone(&self.access_keys),
            auth: Arc::clone(&self.auth),
            config: self.config.clone(),
        }
    }
}
