//! Bearer token authentication.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::access_key::{is_access_key, is_revoked, ApiAccessKey};
use crate::error::Result;
use crate::identity::AccessKeyRegistry;
use crate::jwt::JwtDecoder;
use crate::keys::TrustedKeyRegistry;
use crate::request::{AuthRequest, Authorization, ResponseCookies};
use crate::validator::{AccessTokenValidator, Principal, Verdict};

/// Validates `Authorization: Bearer` tokens against the trusted key set.
///
/// Tokens signed with the access-key key are additionally checked for
/// revocation and for the key's method and path restrictions.
pub struct BearerTokenValidator {
    trusted_keys: Arc<TrustedKeyRegistry>,
    access_keys: Arc<dyn AccessKeyRegistry>,
}

impl BearerTokenValidator {
    /// Create a validator.
    #[must_use]
    pub fn new(trusted_keys: Arc<TrustedKeyRegistry>, access_keys: Arc<dyn AccessKeyRegistry>) -> Self {
        Self {
            trusted_keys,
            access_keys,
        }
    }

    async fn access_key_verdict(&self, key: &ApiAccessKey, request: &AuthRequest) -> Result<Verdict> {
        if is_revoked(key, self.access_keys.as_ref(), Utc::now()).await? {
            tracing::info!(key_id = %key.id(), name = %key.name(), "Access key revoked");
            return Ok(Verdict::Invalid);
        }
        if !key.is_method_allowed(request.method().as_str()) || !key.is_path_allowed(request.path()) {
            tracing::info!(
                key_id = %key.id(),
                method = %request.method(),
                path = %request.path(),
                "Access key not allowed for request"
            );
            return Ok(Verdict::Invalid);
        }
        Ok(Verdict::valid(key.owner(), key.scopes().clone()))
    }
}

#[async_trait]
impl AccessTokenValidator for BearerTokenValidator {
    fn name(&self) -> &'static str {
        "bearer"
    }

    async fn validate(&self, request: &AuthRequest, _: &mut ResponseCookies) -> Result<Verdict> {
        let Some(Authorization::Bearer(token)) = request.authorization() else {
            return Ok(Verdict::NotApplicable);
        };

        let claims = match self.trusted_keys.decoder().decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected");
                return Ok(Verdict::Invalid);
            }
        };

        if claims.is_expired() {
            tracing::debug!(kid = ?claims.key_id(), "Bearer token expired");
            return Ok(Verdict::Invalid);
        }

        if is_access_key(&claims) {
            return match ApiAccessKey::from_claims(&claims) {
                Ok(key) => self.access_key_verdict(&key, request).await,
                Err(e) => {
                    tracing::debug!(error = %e, "Malformed access key");
                    Ok(Verdict::Invalid)
                }
            };
        }

        Ok(Principal::from_claims(&claims).map_or(Verdict::Invalid, Verdict::Valid))
    }
}
