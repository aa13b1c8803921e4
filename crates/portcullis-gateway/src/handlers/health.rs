//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use portcullis_auth::AuthConfig;
use portcullis_control::AccessKeyControl;

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// `oidc` or `standalone`.
    pub login: &'static str,
    /// Credential forms the validator chain accepts.
    pub credentials: Vec<&'static str>,
    /// Number of keys in the published key set.
    pub trusted_keys: usize,
}

impl HealthResponse {
    fn from_config(config: &AuthConfig, trusted_keys: usize) -> Self {
        let mut credentials = vec!["bearer", "cookie"];
        if config.basic_auth_enabled {
            credentials.push("basic");
        }
        Self {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            login: if config.oidc_enabled() { "oidc" } else { "standalone" },
            credentials,
            trusted_keys,
        }
    }
}

/// Health check handler. Public, and served without running the validator chain.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "login": "standalone",
///   "credentials": ["bearer", "cookie"],
///   "trusted_keys": 2
/// }
/// ```
pub async fn health<C>(State(state): State<Arc<GatewayState<C>>>) -> impl IntoResponse
where
    C: AccessKeyControl + 'static,
{
    let trusted_keys = state.auth.trusted_keys.key_set().keys.len();
    let response = HealthResponse::from_config(&state.auth.config, trusted_keys);

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_without_basic() {
        let config = AuthConfig::default();
        let health = HealthResponse::from_config(&config, 2);
        assert_eq!(health.login, "standalone");
        assert_eq!(health.credentials, vec!["bearer", "cookie"]);
        assert_eq!(health.trusted_keys, 2);
    }

    #[test]
    fn basic_listed_when_enabled() {
        let config = AuthConfig {
            basic_auth_enabled: true,
            ..AuthConfig::default()
        };
        let health = HealthResponse::from_config(&config, 1);
        assert!(health.credentials.contains(&"basic"));
    }
}
