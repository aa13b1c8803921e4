//! Records stored in the database.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use portcullis_core::{AccessKeyId, AccessKeyName, ScopeSet, UserName};
use serde::{Deserialize, Serialize};

/// An encrypted refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Subject of the access token the refresh token belongs to.
    pub subject: String,
    /// Base64 ciphertext; never the plain token.
    pub encrypted_token: String,
    /// When the refresh token stops being usable.
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Whether the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A registered API access key.
///
/// The signed token is never stored; only the settings needed to list,
/// renew and check keys for revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyRecord {
    /// Unique key id, carried as `jti` in the token.
    pub key_id: AccessKeyId,
    /// Unique key name, also the owning user name.
    pub name: AccessKeyName,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Scopes granted to the key.
    pub scopes: ScopeSet,
    /// Allowed HTTP methods; empty allows all.
    #[serde(default)]
    pub methods: BTreeSet<String>,
    /// Allowed path patterns; empty allows all.
    #[serde(default)]
    pub paths: BTreeSet<String>,
    /// Temporary keys are never registered, but the flag is kept for listings.
    #[serde(default)]
    pub temporary: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optional expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A user known to the standalone login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user name.
    pub user_name: UserName,
    /// Salted password hash. Users without one cannot log in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Scopes granted to the user.
    pub scopes: ScopeSet,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}
