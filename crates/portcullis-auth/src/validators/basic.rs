//! HTTP Basic authentication.

use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::*;
use secrecy::SecretString;

use portcullis_core::{ScopeSet, UserName};

use crate::error::Result;
use crate::identity::{IdentityStore, UserRegistry};
use crate::request::{AuthRequest, Authorization, ResponseCookies};
use crate::validator::{AccessTokenValidator, Verdict};

/// Validates `Authorization: Basic` credentials against the identity store.
pub struct BasicAuthValidator {
    enabled: bool,
    identities: Arc<dyn IdentityStore>,
    users: Arc<dyn UserRegistry>,
}

impl BasicAuthValidator {
    /// Create a validator. When `enabled` is false every Basic credential is rejected.
    #[must_use]
    pub fn new(
        enabled: bool,
        identities: Arc<dyn IdentityStore>,
        users: Arc<dyn UserRegistry>,
    ) -> Self {
        Self {
            enabled,
            identities,
            users,
        }
    }
}

/// Split `base64(user:pass)`.
fn decode_credentials(encoded: &str) -> Option<(UserName, SecretString)> {
    let decoded = BASE64_STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    let user = UserName::new(user).ok()?;
    Some((user, SecretString::new(password.to_string())))
}

#[async_trait]
impl AccessTokenValidator for BasicAuthValidator {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn validate(&self, request: &AuthRequest, _: &mut ResponseCookies) -> Result<Verdict> {
        let Some(Authorization::Basic(encoded)) = request.authorization() else {
            return Ok(Verdict::NotApplicable);
        };

        if !self.enabled {
            tracing::debug!("Basic authentication is disabled");
            return Ok(Verdict::Invalid);
        }

        let Some((user_name, password)) = decode_credentials(encoded) else {
            tracing::debug!("Malformed Basic credentials");
            return Ok(Verdict::Invalid);
        };

        if !self.identities.verify_password(&user_name, &password).await? {
            tracing::info!(user = %user_name, "Basic authentication failed");
            return Ok(Verdict::Invalid);
        }

        let scopes = self
            .users
            .find_user(&user_name)
            .await?
            .map(|user| user.scopes)
            .unwrap_or_else(ScopeSet::new);
        Ok(Verdict::valid(user_name, scopes))
    }
}
