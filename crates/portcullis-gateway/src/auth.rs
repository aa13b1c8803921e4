//! Authentication middleware and extractors.
//!
//! [`authenticate`] runs the validator chain once per request and stores the
//! sealed [`UserContext`] in the request extensions, where handlers pick it
//! up through the [`Caller`] extractor and check their [`AccessRule`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use portcullis_auth::{
    AccessRule, AuthRequest, ResponseCookies, ScopeAuthorizer, ScopePolicy, UserContext,
};
use portcullis_control::AccessKeyControl;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Requests below this path are never authenticated.
pub const LOGIN_PATH_PREFIX: &str = "/api/v1/login";

/// Scopes granting full access to access-key management.
const ACCESS_KEY_SCOPES: [&str; 2] = ["adm", "adm.accesskey"];
/// Scopes additionally granting read access to access keys.
const ACCESS_KEY_READ_SCOPES: [&str; 2] = ["adm.read", "adm.accesskey.read"];

/// Rule of the access-key read operations.
#[must_use]
pub fn access_key_read() -> AccessRule {
    AccessRule::new(
        ScopePolicy::scopes(ACCESS_KEY_SCOPES),
        ScopePolicy::scopes(ACCESS_KEY_READ_SCOPES),
    )
}

/// Rule of the access-key write operations.
#[must_use]
pub fn access_key_write() -> AccessRule {
    AccessRule::new(ScopePolicy::scopes(ACCESS_KEY_SCOPES), ScopePolicy::none())
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Caller(pub UserContext);

impl Caller {
    /// Check `rule` against the caller.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for anonymous callers and `Forbidden` when the
    /// caller lacks the allowed scopes.
    pub fn require(&self, authorizer: &ScopeAuthorizer, rule: &AccessRule) -> Result<(), ApiError> {
        authorizer.authorize(rule, &self.0).map_err(ApiError::from)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_else(|| Self(UserContext::unauthenticated())))
    }
}

/// Middleware authenticating every request through the validator chain.
///
/// A rejected credential ends the request with 401. Cookies queued by the
/// validators are added to whatever response is sent.
pub async fn authenticate<C>(
    State(state): State<Arc<GatewayState<C>>>,
    mut request: Request,
    next: Next,
) -> Response
where
    C: AccessKeyControl + 'static,
{
    if is_login_path(request.uri().path()) {
        return next.run(request).await;
    }

    let auth_request = AuthRequest::new(
        request.method().clone(),
        request.uri().path(),
        request.headers().clone(),
    )
    .with_secure(is_secure(request.headers(), request.uri()));

    let mut cookies = ResponseCookies::new();
    let mut response = match state.auth.chain.authenticate(&auth_request, &mut cookies).await {
        Ok(context) => {
            request.extensions_mut().insert(Caller(context));
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(path = %auth_request.path(), error = %e, "Authentication failed");
            ApiError::from(e).into_response()
        }
    };

    append_cookies(response.headers_mut(), &cookies);
    response
}

/// Whether `path` belongs to the login endpoints.
#[must_use]
pub fn is_login_path(path: &str) -> bool {
    path.strip_prefix(LOGIN_PATH_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Whether the client reached the gateway over TLS, possibly through a proxy.
#[must_use]
pub fn is_secure(headers: &HeaderMap, uri: &Uri) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || uri.scheme_str() == Some("https"),
            |proto| proto.eq_ignore_ascii_case("https"),
        )
}

/// Add queued cookies as `Set-Cookie` headers.
pub fn append_cookies(headers: &mut HeaderMap, cookies: &ResponseCookies) {
    for cookie in cookies.iter() {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(cookie = %cookie.name(), error = %e, "Dropping unencodable cookie"),
        }
    }
}
