//! Standalone login and logout.
//!
//! Both endpoints live below `/api/v1/login` and run without the validator
//! chain, so a stale cookie never blocks a fresh login.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use portcullis_auth::{ResponseCookies, SetCookie, UserInfo};
use portcullis_control::AccessKeyControl;
use portcullis_core::{ScopeSet, UserName};

use crate::auth::{append_cookies, is_secure};
use crate::error::ApiError;
use crate::state::GatewayState;

/// Login form.
#[derive(Deserialize)]
pub struct LoginRequest {
    /// The user logging in.
    pub user_name: String,
    /// The user's password.
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("user_name", &self.user_name)
            .finish_non_exhaustive()
    }
}

/// The logged-in user.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// User name.
    pub user_name: UserName,
    /// Scopes granted to the session.
    pub scopes: ScopeSet,
}

/// Response to a logout.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    /// Where the browser ends the provider session, if OIDC is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

/// Verify username and password and issue the login cookie.
///
/// # Errors
///
/// Returns 404 when OIDC handles logins, 401 on bad credentials.
pub async fn login<C>(
    State(state): State<Arc<GatewayState<C>>>,
    headers: HeaderMap,
    uri: Uri,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError>
where
    C: AccessKeyControl + 'static,
{
    let Some(standalone) = &state.auth.standalone else {
        return Err(ApiError::NotFound("standalone login is disabled".to_string()));
    };

    let Ok(user_name) = UserName::new(body.user_name) else {
        return Err(ApiError::Unauthorized);
    };
    let password = SecretString::new(body.password);

    if !state
        .auth
        .identities
        .verify_password(&user_name, &password)
        .await?
    {
        tracing::info!(user = %user_name, "Login failed");
        return Err(ApiError::Unauthorized);
    }

    let user = state
        .auth
        .users
        .find_user(&user_name)
        .await?
        .unwrap_or_else(|| UserInfo::new(user_name, ScopeSet::new()));

    let mut cookies = ResponseCookies::new();
    standalone.issue_cookie(&user, is_secure(&headers, &uri), &mut cookies)?;
    tracing::info!(user = %user.user_name, "User logged in");

    let mut response = Json(LoginResponse {
        user_name: user.user_name,
        scopes: user.scopes,
    })
    .into_response();
    append_cookies(response.headers_mut(), &cookies);
    Ok(response)
}

/// Expire the login cookies.
pub async fn logout<C>(
    State(state): State<Arc<GatewayState<C>>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response
where
    C: AccessKeyControl + 'static,
{
    let config = &state.auth.config;
    let secure = is_secure(&headers, &uri);

    let mut cookies = ResponseCookies::new();
    if let Some(standalone) = &state.auth.standalone {
        standalone.clear_cookie(secure, &mut cookies);
    } else {
        cookies.set(SetCookie::removal(config.access_cookie_name.as_str(), secure));
        cookies.set(SetCookie::removal(config.id_cookie_name.as_str(), secure));
    }

    let mut response = Json(LogoutResponse {
        end_session_endpoint: config
            .oidc
            .as_ref()
            .and_then(|oidc| oidc.end_session_endpoint.clone()),
    })
    .into_response();
    append_cookies(response.headers_mut(), &cookies);
    response
}
