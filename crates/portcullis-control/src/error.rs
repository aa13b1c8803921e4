//! Error types for access-key management.

use portcullis_core::{AccessKeyId, AccessKeyName};
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in access-key management operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested access key was not found.
    #[error("access key not found: {0}")]
    AccessKeyNotFound(AccessKeyId),

    /// Another access key already uses the name.
    #[error("access key name already in use: {0}")]
    DuplicateKeyName(AccessKeyName),

    /// The request is well-formed but cannot be carried out.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] portcullis_store::StoreError),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(#[from] portcullis_auth::AuthError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::AccessKeyNotFound(_) => 404,
            Self::DuplicateKeyName(_) => 409,
            Self::InvalidRequest(_) => 400,
            Self::Store(_) | Self::Internal(_) => 500,
            Self::Auth(e) => e.http_status_code(),
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Store(_) | Self::Internal(_) => true,
            Self::Auth(e) => e.is_retriable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_auth::AuthError;

    #[test]
    fn error_status_codes() {
        let key_id = AccessKeyId::generate();
        let name = AccessKeyName::new("ci-pipeline").unwrap();

        assert_eq!(ControlError::AccessKeyNotFound(key_id).http_status_code(), 404);
        assert_eq!(ControlError::DuplicateKeyName(name).http_status_code(), 409);
        assert_eq!(
            ControlError::InvalidRequest("no expiry".to_string()).http_status_code(),
            400
        );
        assert_eq!(
            ControlError::Auth(AuthError::UnprocessableToken("bad".to_string()))
                .http_status_code(),
            422
        );
        assert_eq!(
            ControlError::Store(portcullis_store::StoreError::NotFound).http_status_code(),
            500
        );
    }

    #[test]
    fn retriable() {
        assert!(ControlError::Internal("boom".to_string()).is_retriable());
        assert!(!ControlError::AccessKeyNotFound(AccessKeyId::generate()).is_retriable());
    }
}
