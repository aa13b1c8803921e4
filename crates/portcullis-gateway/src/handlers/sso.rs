//! Published login and single-sign-on settings. All public.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use portcullis_control::AccessKeyControl;

use crate::routes::{JWKS_PATH, LOGIN_PATH};
use crate::state::GatewayState;

/// How the UI logs users in.
#[derive(Debug, Serialize)]
pub struct LoginConfiguration {
    /// Whether logins go through the OIDC provider.
    pub oidc_enabled: bool,
    /// Client id to use at the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc_client_id: Option<String>,
    /// The login view, the provider's authorization endpoint under OIDC.
    pub login_view: String,
}

/// Endpoints peer services use to obtain and verify tokens.
#[derive(Debug, Serialize)]
pub struct SsoSettings {
    /// Where tokens are obtained.
    pub token_endpoint: String,
    /// The aggregated trusted key set.
    pub jwks_uri: String,
}

/// `GET /api/v1/login/config`
pub async fn login_config<C>(State(state): State<Arc<GatewayState<C>>>) -> impl IntoResponse
where
    C: AccessKeyControl + 'static,
{
    let config = &state.auth.config;
    let response = match &config.oidc {
        Some(oidc) => LoginConfiguration {
            oidc_enabled: true,
            oidc_client_id: Some(oidc.client_id.clone()),
            login_view: oidc
                .authorization_endpoint
                .clone()
                .unwrap_or_else(|| config.login_view.clone()),
        },
        None => LoginConfiguration {
            oidc_enabled: false,
            oidc_client_id: None,
            login_view: config.login_view.clone(),
        },
    };
    Json(response)
}

/// `GET /api/v1/sso/settings`
pub async fn sso_settings<C>(State(state): State<Arc<GatewayState<C>>>) -> impl IntoResponse
where
    C: AccessKeyControl + 'static,
{
    let public_url = &state.config.public_url;
    let token_endpoint = state.auth.config.oidc.as_ref().map_or_else(
        || format!("{public_url}{LOGIN_PATH}"),
        |oidc| oidc.token_endpoint.clone(),
    );
    Json(SsoSettings {
        token_endpoint,
        jwks_uri: format!("{public_url}{JWKS_PATH}"),
    })
}

/// `GET /api/v1/.well-known/jwks.json`
pub async fn jwks<C>(State(state): State<Arc<GatewayState<C>>>) -> impl IntoResponse
where
    C: AccessKeyControl + 'static,
{
    Json(state.auth.trusted_keys.key_set())
}
