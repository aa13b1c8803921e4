//! OIDC access-token cookie authentication with silent refresh.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::SecretString;

use crate::claims::Claims;
use crate::error::Result;
use crate::identity::{OidcProvider, RefreshTokenStore};
use crate::jwt::{JwksDecoder, JwtDecoder};
use crate::request::{AuthRequest, ResponseCookies, SetCookie};
use crate::validator::{AccessTokenValidator, Principal, Verdict};

/// Validates the access-token cookie issued by the OIDC provider.
///
/// An expired but genuine token is refreshed with the subject's stored
/// refresh token. The new cookies live as long as the refresh token does.
pub struct OidcCookieValidator {
    decoder: JwksDecoder,
    provider: Arc<dyn OidcProvider>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    access_cookie: String,
    id_cookie: String,
}

impl OidcCookieValidator {
    /// Create a validator verifying against the provider's keys.
    #[must_use]
    pub fn new(
        decoder: JwksDecoder,
        provider: Arc<dyn OidcProvider>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        access_cookie: impl Into<String>,
        id_cookie: impl Into<String>,
    ) -> Self {
        Self {
            decoder,
            provider,
            refresh_tokens,
            access_cookie: access_cookie.into(),
            id_cookie: id_cookie.into(),
        }
    }

    async fn refresh(
        &self,
        expired: &Claims,
        request: &AuthRequest,
        cookies: &mut ResponseCookies,
    ) -> Result<Verdict> {
        let Some(subject) = expired.subject() else {
            return Ok(Verdict::Invalid);
        };
        let Some(stored) = self.refresh_tokens.refresh_token(subject).await? else {
            tracing::debug!(sub = %subject, "No refresh token stored");
            return Ok(Verdict::Invalid);
        };

        let tokens = match self.provider.refresh_access_token(&stored.token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::info!(sub = %subject, error = %e, "Access token refresh failed");
                return Ok(Verdict::Invalid);
            }
        };

        let claims = match self.decoder.decode(&tokens.access_token) {
            Ok(claims) if !claims.is_expired() => claims,
            Ok(_) => {
                tracing::warn!(sub = %subject, "Provider issued an expired access token");
                return Ok(Verdict::Invalid);
            }
            Err(e) => {
                tracing::warn!(sub = %subject, error = %e, "Refreshed access token rejected");
                return Ok(Verdict::Invalid);
            }
        };

        if claims.subject() != Some(subject) {
            tracing::warn!(
                sub = %subject,
                refreshed_sub = claims.subject().unwrap_or_default(),
                "Refreshed access token belongs to another subject"
            );
            return Ok(Verdict::Invalid);
        }

        let now = Utc::now();
        let max_age = tokens
            .refresh_expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .unwrap_or_else(|| (stored.expires_at - now).num_seconds());

        if let Some(rotated) = &tokens.refresh_token {
            self.refresh_tokens
                .store_refresh_token(
                    subject,
                    &SecretString::new(rotated.clone()),
                    now + Duration::seconds(max_age),
                )
                .await?;
        }

        let secure = request.is_secure();
        cookies.set(SetCookie::new(
            &self.access_cookie,
            &tokens.access_token,
            max_age,
            secure,
        ));
        if let Some(id_token) = &tokens.id_token {
            cookies.set(SetCookie::new(&self.id_cookie, id_token, max_age, secure));
        }

        tracing::debug!(sub = %subject, max_age, "Access token refreshed");
        Ok(Principal::from_claims(&claims).map_or(Verdict::Invalid, Verdict::Valid))
    }
}

#[async_trait]
impl AccessTokenValidator for OidcCookieValidator {
    fn name(&self) -> &'static str {
        "oidc-cookie"
    }

    async fn validate(&self, request: &AuthRequest, cookies: &mut ResponseCookies) -> Result<Verdict> {
        let Some(token) = request.cookie(&self.access_cookie) else {
            return Ok(Verdict::NotApplicable);
        };

        let claims = match self.decoder.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Access cookie rejected");
                return Ok(Verdict::Invalid);
            }
        };

        if claims.is_expired() {
            return self.refresh(&claims, request, cookies).await;
        }

        Ok(Principal::from_claims(&claims).map_or(Verdict::Invalid, Verdict::Valid))
    }
}
