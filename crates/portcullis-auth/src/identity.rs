//! Collaborator contracts consumed by the validators.
//!
//! Persistence of users, refresh tokens and access keys lives outside this
//! crate. Validators reach it only through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use portcullis_core::{AccessKeyId, ScopeSet, UserName};

use crate::client::OAuth2Tokens;
use crate::error::Result;

// ============================================================================
// Users
// ============================================================================

/// A user as known to the user registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// The user's name.
    pub user_name: UserName,
    /// Scopes granted through the user's roles.
    pub scopes: ScopeSet,
}

impl UserInfo {
    /// Create a user record.
    #[must_use]
    pub const fn new(user_name: UserName, scopes: ScopeSet) -> Self {
        Self { user_name, scopes }
    }
}

/// Password check against an external identity store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Whether `password` is the current password of `user_name`.
    ///
    /// Unknown users yield `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be consulted.
    async fn verify_password(&self, user_name: &UserName, password: &SecretString)
        -> Result<bool>;
}

/// Lookup of a user's current scopes.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Find a user by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be consulted.
    async fn find_user(&self, user_name: &UserName) -> Result<Option<UserInfo>>;
}

// ============================================================================
// Refresh tokens
// ============================================================================

/// A refresh token read back from the store.
#[derive(Debug)]
pub struct StoredRefreshToken {
    /// The plaintext refresh token.
    pub token: SecretString,
    /// When the refresh token stops being usable.
    pub expires_at: DateTime<Utc>,
}

/// Refresh tokens keyed by token subject.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Store or replace the refresh token of `subject`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be encrypted or persisted.
    async fn store_refresh_token(
        &self,
        subject: &str,
        token: &SecretString,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// The refresh token of `subject`. Missing and expired entries yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the entry cannot be
    /// decrypted.
    async fn refresh_token(&self, subject: &str) -> Result<Option<StoredRefreshToken>>;

    /// Forget the refresh token of `subject`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn remove_refresh_token(&self, subject: &str) -> Result<()>;
}

// ============================================================================
// Access keys
// ============================================================================

/// Presence check used to revoke access keys.
#[async_trait]
pub trait AccessKeyRegistry: Send + Sync {
    /// Whether a key with this id is currently registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be consulted.
    async fn is_registered(&self, id: &AccessKeyId) -> Result<bool>;
}

// ============================================================================
// Identity provider
// ============================================================================

/// Token refresh against an OpenID Connect provider.
#[async_trait]
pub trait OidcProvider: Send + Sync {
    /// Exchange a refresh token for a fresh token set.
    ///
    /// # Errors
    ///
    /// Returns `IdentityProvider` if the provider is unreachable or rejects
    /// the refresh token.
    async fn refresh_access_token(&self, refresh_token: &SecretString) -> Result<OAuth2Tokens>;
}
