//! OpenID Connect provider client.
//!
//! Covers the two provider calls this service makes: refreshing an access
//! token and loading the provider's key set at start-up.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::OidcConfig;
use crate::error::{AuthError, Result};
use crate::identity::OidcProvider;
use crate::jwks::JwkSet;

/// Token response of an OAuth2 token endpoint.
#[derive(Clone, Deserialize)]
pub struct OAuth2Tokens {
    /// The new access token.
    pub access_token: String,
    /// Token type, usually `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Access-token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// A rotated refresh token, if the provider issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Refresh-token lifetime in seconds.
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
    /// The OpenID id token.
    #[serde(default)]
    pub id_token: Option<String>,
    /// Granted scopes, space separated.
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for OAuth2Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Tokens")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Error body of an OAuth2 endpoint.
#[derive(Debug, Deserialize)]
struct OAuth2ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// HTTP client for the OIDC provider.
pub struct OidcClient {
    config: Arc<OidcConfig>,
    client: reqwest::Client,
}

impl OidcClient {
    /// Create a client honouring the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be created.
    pub fn new(config: Arc<OidcConfig>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.connect_timeout + config.read_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("cannot create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// The provider configuration.
    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Load the provider's key set.
    ///
    /// # Errors
    ///
    /// Returns `IdentityProvider` if the document cannot be fetched or parsed.
    pub async fn fetch_jwks(&self) -> Result<JwkSet> {
        let url = &self.config.jwks_url;
        tracing::debug!(url = %url, "Fetching provider JWKS");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::IdentityProvider(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("invalid JWKS response: {e}")))?;

        tracing::info!(keys = set.keys.len(), "Provider JWKS loaded");
        Ok(set)
    }
}

#[async_trait]
impl OidcProvider for OidcClient {
    async fn refresh_access_token(&self, refresh_token: &SecretString) -> Result<OAuth2Tokens> {
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret().as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("token request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AuthError::IdentityProvider(format!("invalid token response: {e}")));
        }

        let error: Option<OAuth2ErrorResponse> = response.json().await.ok();
        match error {
            Some(err) => {
                tracing::info!(
                    error = %err.error,
                    description = ?err.error_description,
                    "Provider rejected refresh token"
                );
                Err(AuthError::IdentityProvider(err.error))
            }
            None => Err(AuthError::IdentityProvider(format!("HTTP {status}"))),
        }
    }
}

impl fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcClient")
            .field("token_endpoint", &self.config.token_endpoint)
            .finish_non_exhaustive()
    }
}
