//! Authentication and authorization error types.

use portcullis_core::{ScopeSet, UserName};
use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is malformed, its signature does not verify, or its key id
    /// is missing or unknown.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// A recognized credential did not validate.
    #[error("invalid credential")]
    InvalidCredential,

    /// A token submitted for inspection cannot be processed.
    #[error("unprocessable token: {0}")]
    UnprocessableToken(String),

    /// A protected operation was invoked without authentication.
    #[error("unauthenticated access denied")]
    UnauthenticatedAccessDenied,

    /// The caller holds none of the scopes the operation allows.
    #[error("access denied for {user}: requires one of [{allowed}]")]
    ScopeAccessDenied {
        /// The authenticated caller.
        user: UserName,
        /// The scopes that would have granted access.
        allowed: ScopeSet,
    },

    /// The key and algorithm pairing cannot be used for signing or verifying.
    #[error("signing configuration error: {0}")]
    SigningConfiguration(String),

    /// Signing a token failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The user context was modified after it was sealed.
    #[error("user context is sealed")]
    ContextSealed,

    /// The OIDC provider could not be reached or rejected the request.
    #[error("identity provider error: {0}")]
    IdentityProvider(String),

    /// Encrypting or decrypting a secret failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// A configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An external collaborator (store, registry) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

impl AuthError {
    /// Returns `true` if the failure is transient and the call may succeed later.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::IdentityProvider(_) | Self::Collaborator(_))
    }

    /// Returns `true` for errors that reject a credential outright.
    #[must_use]
    pub const fn is_invalid_credential(&self) -> bool {
        matches!(self, Self::InvalidToken(_) | Self::InvalidCredential)
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidToken(_) | Self::InvalidCredential | Self::UnauthenticatedAccessDenied => {
                401
            }
            Self::ScopeAccessDenied { .. } => 403,
            Self::UnprocessableToken(_) => 422,
            Self::IdentityProvider(_) => 502,
            Self::SigningConfiguration(_)
            | Self::Signing(_)
            | Self::ContextSealed
            | Self::Encryption(_)
            | Self::Configuration(_)
            | Self::Collaborator(_) => 500,
        }
    }
}
