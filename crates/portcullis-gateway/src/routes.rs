//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use portcullis_control::AccessKeyControl;

use crate::auth;
use crate::handlers::{access_keys, health, login, sso};
use crate::state::GatewayState;

/// Standalone login endpoint.
pub const LOGIN_PATH: &str = "/api/v1/login/_login";
/// Published trusted key set.
pub const JWKS_PATH: &str = "/api/v1/.well-known/jwks.json";

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check (bypasses authentication)
/// - `GET /api/v1/.well-known/jwks.json` - Trusted key set
/// - `GET /api/v1/sso/settings` - Token and JWKS endpoints
/// - `GET /api/v1/login/config` - Login configuration
/// - `POST /api/v1/login/_login` - Standalone login
/// - `GET /api/v1/login/_logout` - Logout
///
/// ## Access keys (scoped)
/// - `GET /api/v1/accesskeys?filter=` - List access keys
/// - `POST /api/v1/accesskeys` - Create access key
/// - `POST /api/v1/accesskeys/_validate` - Inspect an access-key token
/// - `POST /api/v1/accesskeys/_restore` - Re-register an access-key token
/// - `GET /api/v1/accesskeys/:key_id` - Get access key
/// - `DELETE /api/v1/accesskeys/:key_id` - Remove access key
/// - `PUT /api/v1/accesskeys/:key_id/description` - Update description
/// - `POST /api/v1/accesskeys/:key_id/_renew` - Renew access key
pub fn create_router<C>(state: GatewayState<C>) -> Router
where
    C: AccessKeyControl + 'static,
{
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let cors = build_cors_layer(&cors_origins);
    let state = Arc::new(state);

    let api = Router::new()
        // Published settings
        .route(JWKS_PATH, get(sso::jwks::<C>))
        .route("/api/v1/sso/settings", get(sso::sso_settings::<C>))
        .route("/api/v1/login/config", get(sso::login_config::<C>))
        .route(LOGIN_PATH, post(login::login::<C>))
        .route("/api/v1/login/_logout", get(login::logout::<C>))
        // Access keys
        .route(
            "/api/v1/accesskeys",
            get(access_keys::list_access_keys::<C>).post(access_keys::create_access_key::<C>),
        )
        .route(
            "/api/v1/accesskeys/_validate",
            post(access_keys::validate_access_key::<C>),
        )
        .route(
            "/api/v1/accesskeys/_restore",
            post(access_keys::restore_access_key::<C>),
        )
        .route(
            "/api/v1/accesskeys/:key_id",
            get(access_keys::get_access_key::<C>).delete(access_keys::remove_access_key::<C>),
        )
        .route(
            "/api/v1/accesskeys/:key_id/description",
            put(access_keys::update_description::<C>),
        )
        .route(
            "/api/v1/accesskeys/:key_id/_renew",
            post(access_keys::renew_access_key::<C>),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::authenticate::<C>,
        ));

    Router::new()
        .route("/health", get(health::health::<C>))
        .merge(api)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_any_origin() {
        let origins = vec!["*".to_string()];
        let _layer = build_cors_layer(&origins);
    }

    #[test]
    fn cors_specific_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "https://app.example.com".to_string(),
        ];
        let _layer = build_cors_layer(&origins);
    }
}
