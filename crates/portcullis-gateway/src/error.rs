//! API error types and responses.
//!
//! This module defines the standard error format for all API responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use portcullis_auth::AuthError;
use portcullis_control::ControlError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller lacks the scopes for this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A submitted token cannot be processed.
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// The identity provider failed.
    #[error("identity provider unavailable")]
    BadGateway,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::Unprocessable(_) => "unprocessable",
            Self::BadGateway => "bad_gateway",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            let headers = response.headers_mut();
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken(_)
            | AuthError::InvalidCredential
            | AuthError::UnauthenticatedAccessDenied => Self::Unauthorized,
            AuthError::ScopeAccessDenied { allowed, .. } => {
                Self::Forbidden(format!("one of the scopes [{allowed}] is required"))
            }
            AuthError::UnprocessableToken(msg) => Self::Unprocessable(msg),
            AuthError::IdentityProvider(msg) => {
                tracing::error!(error = %msg, "Identity provider error");
                Self::BadGateway
            }
            AuthError::SigningConfiguration(_)
            | AuthError::Signing(_)
            | AuthError::ContextSealed
            | AuthError::Encryption(_)
            | AuthError::Configuration(_)
            | AuthError::Collaborator(_) => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Internal("authentication service error".to_string())
            }
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::AccessKeyNotFound(id) => Self::NotFound(format!("access key {id}")),
            ControlError::DuplicateKeyName(name) => {
                Self::Conflict(format!("access key name {name} is already in use"))
            }
            ControlError::InvalidRequest(msg) => Self::BadRequest(msg),
            ControlError::Auth(auth_err) => Self::from(auth_err),
            ControlError::Store(store_err) => {
                tracing::error!(error = %store_err, "Store error");
                Self::Internal("storage error".to_string())
            }
            ControlError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                Self::Internal(msg)
            }
        }
    }
}
