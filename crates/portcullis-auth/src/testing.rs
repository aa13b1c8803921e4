//! Test doubles and fixtures.
//!
//! In-memory collaborators and cached RSA keys. Generating a 2048-bit key is
//! slow, so each key is generated once per test binary.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use parking_lot::RwLock;
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};

use portcullis_core::{AccessKeyId, ScopeSet, UserName};

use crate::access_key::{AccessKeyCodec, API_KEY_ID};
use crate::error::Result;
use crate::identity::{
    AccessKeyRegistry, IdentityStore, RefreshTokenStore, StoredRefreshToken, UserInfo,
    UserRegistry,
};
use crate::jwt::RsaJwtService;
use crate::request::AuthRequest;

static KEYS: [OnceLock<RsaPrivateKey>; 3] = [OnceLock::new(), OnceLock::new(), OnceLock::new()];

/// A cached 2048-bit RSA key. Distinct indices yield distinct keys.
///
/// # Panics
///
/// Panics if `index` is 3 or more, or key generation fails.
#[must_use]
pub fn rsa_key(index: usize) -> &'static RsaPrivateKey {
    KEYS[index].get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate test key")
    })
}

/// An access-key codec over cached key 0.
///
/// # Panics
///
/// Panics if the signer cannot be created.
#[must_use]
pub fn access_key_codec() -> AccessKeyCodec {
    let signer = RsaJwtService::new(API_KEY_ID, rsa_key(0)).expect("access-key signer");
    AccessKeyCodec::new(Arc::new(signer)).expect("access-key codec")
}

/// Build a request view with the given headers.
///
/// # Panics
///
/// Panics if a header name or value is invalid.
#[must_use]
pub fn request(method: Method, path: &str, headers: &[(&str, &str)]) -> AuthRequest {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(
            HeaderName::from_bytes(name.as_bytes()).expect("header name"),
            HeaderValue::from_str(value).expect("header value"),
        );
    }
    AuthRequest::new(method, path, map)
}

fn user_name(name: &str) -> UserName {
    UserName::new(name).expect("valid user name")
}

/// Identity store holding plaintext passwords.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    passwords: RwLock<HashMap<UserName, String>>,
}

impl InMemoryIdentityStore {
    /// Add or replace a user.
    pub fn add_user(&self, name: &str, password: &str) {
        self.passwords
            .write()
            .insert(user_name(name), password.to_string());
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn verify_password(&self, user: &UserName, password: &SecretString) -> Result<bool> {
        Ok(self
            .passwords
            .read()
            .get(user)
            .is_some_and(|p| p == password.expose_secret()))
    }
}

/// User registry backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryUserRegistry {
    users: RwLock<HashMap<UserName, ScopeSet>>,
}

impl InMemoryUserRegistry {
    /// Add or replace a user.
    pub fn add_user(&self, name: &str, scopes: &[&str]) {
        self.users
            .write()
            .insert(user_name(name), scopes.iter().copied().collect());
    }

    /// Remove a user.
    pub fn remove_user(&self, name: &str) {
        self.users.write().remove(&user_name(name));
    }
}

#[async_trait]
impl UserRegistry for InMemoryUserRegistry {
    async fn find_user(&self, name: &UserName) -> Result<Option<UserInfo>> {
        Ok(self
            .users
            .read()
            .get(name)
            .map(|scopes| UserInfo::new(name.clone(), scopes.clone())))
    }
}

/// Refresh-token store without encryption.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn store_refresh_token(
        &self,
        subject: &str,
        token: &SecretString,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.tokens.write().insert(
            subject.to_string(),
            (token.expose_secret().clone(), expires_at),
        );
        Ok(())
    }

    async fn refresh_token(&self, subject: &str) -> Result<Option<StoredRefreshToken>> {
        let now = Utc::now();
        Ok(self
            .tokens
            .read()
            .get(subject)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(token, expires_at)| StoredRefreshToken {
                token: SecretString::new(token.clone()),
                expires_at: *expires_at,
            }))
    }

    async fn remove_refresh_token(&self, subject: &str) -> Result<()> {
        self.tokens.write().remove(subject);
        Ok(())
    }
}

/// Access-key registry backed by a set of ids.
#[derive(Debug, Default)]
pub struct InMemoryAccessKeyRegistry {
    ids: RwLock<HashSet<AccessKeyId>>,
}

impl InMemoryAccessKeyRegistry {
    /// Register a key id.
    pub fn register(&self, id: AccessKeyId) {
        self.ids.write().insert(id);
    }

    /// Remove a key id.
    pub fn unregister(&self, id: &AccessKeyId) {
        self.ids.write().remove(id);
    }
}

#[async_trait]
impl AccessKeyRegistry for InMemoryAccessKeyRegistry {
    async fn is_registered(&self, id: &AccessKeyId) -> Result<bool> {
        Ok(self.ids.read().contains(id))
    }
}
