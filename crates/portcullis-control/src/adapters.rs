//! Store-backed implementations of the collaborators the validators need.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_auth::{
    AccessKeyRegistry, AuthError, IdentityStore, MasterSecret, RefreshTokenStore,
    StoredRefreshToken, UserInfo, UserRegistry,
};
use portcullis_core::{AccessKeyId, ScopeSet, UserName};
use portcullis_store::{RefreshTokenRecord, Store, StoreError, UserRecord};
use secrecy::SecretString;

use crate::error::Result;
use crate::password;

fn collaborator(e: StoreError) -> AuthError {
    AuthError::Collaborator(e.to_string())
}

// ============================================================================
// Access Key Registry
// ============================================================================

/// Answers revocation checks from the access-key column family.
pub struct StoreAccessKeyRegistry<S: Store> {
    store: Arc<S>,
}

impl<S: Store> StoreAccessKeyRegistry<S> {
    /// Create a registry over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store + 'static> AccessKeyRegistry for StoreAccessKeyRegistry<S> {
    async fn is_registered(&self, key_id: &AccessKeyId) -> portcullis_auth::Result<bool> {
        self.store.access_key_exists(key_id).map_err(collaborator)
    }
}

// ============================================================================
// Refresh Tokens
// ============================================================================

/// Keeps OIDC refresh tokens encrypted under the master secret.
pub struct EncryptedRefreshTokenStore<S: Store> {
    store: Arc<S>,
    secret: Arc<MasterSecret>,
}

impl<S: Store> EncryptedRefreshTokenStore<S> {
    /// Create a refresh-token store over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, secret: Arc<MasterSecret>) -> Self {
        Self { store, secret }
    }
}

#[async_trait]
impl<S: Store + 'static> RefreshTokenStore for EncryptedRefreshTokenStore<S> {
    async fn store_refresh_token(
        &self,
        subject: &str,
        token: &SecretString,
        expires_at: DateTime<Utc>,
    ) -> portcullis_auth::Result<()> {
        let record = RefreshTokenRecord {
            subject: subject.to_string(),
            encrypted_token: self.secret.encrypt_secret(token)?,
            expires_at,
        };
        self.store.put_refresh_token(&record).map_err(collaborator)
    }

    async fn refresh_token(&self, subject: &str) -> portcullis_auth::Result<Option<StoredRefreshToken>> {
        let Some(record) = self.store.get_refresh_token(subject).map_err(collaborator)? else {
            return Ok(None);
        };
        if record.is_expired_at(Utc::now()) {
            return Ok(None);
        }

        match self.secret.decrypt_secret(&record.encrypted_token) {
            Ok(token) => Ok(Some(StoredRefreshToken {
                token,
                expires_at: record.expires_at,
            })),
            Err(e) => {
                // Encrypted under an earlier master secret
                tracing::warn!(sub = %subject, error = %e, "Discarding undecryptable refresh token");
                self.store.delete_refresh_token(subject).map_err(collaborator)?;
                Ok(None)
            }
        }
    }

    async fn remove_refresh_token(&self, subject: &str) -> portcullis_auth::Result<()> {
        self.store.delete_refresh_token(subject).map_err(collaborator)
    }
}

// ============================================================================
// Users
// ============================================================================

/// Users of the standalone login: password check and current scopes.
pub struct StoreUserDirectory<S: Store> {
    store: Arc<S>,
}

impl<S: Store> StoreUserDirectory<S> {
    /// Create a directory over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Insert or replace a user. A `None` password disables password login.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails or the record cannot be stored.
    pub fn put_user(
        &self,
        user_name: UserName,
        password: Option<&SecretString>,
        scopes: ScopeSet,
    ) -> Result<UserRecord> {
        let now = Utc::now();
        let created_at = self
            .store
            .get_user(&user_name)?
            .map_or(now, |existing| existing.created_at);

        let record = UserRecord {
            user_name,
            password_hash: password.map(password::hash_password).transpose()?,
            scopes,
            created_at,
            updated_at: now,
        };
        self.store.put_user(&record)?;

        tracing::info!(user = %record.user_name, scopes = %record.scopes, "User stored");
        Ok(record)
    }
}

#[async_trait]
impl<S: Store + 'static> IdentityStore for StoreUserDirectory<S> {
    async fn verify_password(
        &self,
        user_name: &UserName,
        password: &SecretString,
    ) -> portcullis_auth::Result<bool> {
        let user = self.store.get_user(user_name).map_err(collaborator)?;
        Ok(user
            .and_then(|u| u.password_hash)
            .is_some_and(|hash| password::verify_password(password, &hash)))
    }
}

#[async_trait]
impl<S: Store + 'static> UserRegistry for StoreUserDirectory<S> {
    async fn find_user(&self, user_name: &UserName) -> portcullis_auth::Result<Option<UserInfo>> {
        Ok(self
            .store
            .get_user(user_name)
            .map_err(collaborator)?
            .map(|u| UserInfo::new(u.user_name, u.scopes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use portcullis_store::RocksStore;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    fn setup() -> (Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        (store, dir)
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[tokio::test]
    async fn refresh_tokens_are_encrypted_at_rest() {
        let (store, _dir) = setup();
        let tokens =
            EncryptedRefreshTokenStore::new(store.clone(), Arc::new(MasterSecret::generate().unwrap()));

        tokens
            .store_refresh_token("6a1f2c3d-jane", &secret("rt-1"), Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let raw = store.get_refresh_token("6a1f2c3d-jane").unwrap().unwrap();
        assert!(!raw.encrypted_token.contains("rt-1"));

        let stored = tokens.refresh_token("6a1f2c3d-jane").await.unwrap().unwrap();
        assert_eq!(stored.token.expose_secret(), "rt-1");

        tokens.remove_refresh_token("6a1f2c3d-jane").await.unwrap();
        assert!(tokens.refresh_token("6a1f2c3d-jane").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_refresh_token_is_absent() {
        let (store, _dir) = setup();
        let tokens =
            EncryptedRefreshTokenStore::new(store, Arc::new(MasterSecret::generate().unwrap()));
        tokens
            .store_refresh_token("jane", &secret("rt-1"), Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert!(tokens.refresh_token("jane").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn token_from_another_secret_is_discarded() {
        let (store, _dir) = setup();
        let before =
            EncryptedRefreshTokenStore::new(store.clone(), Arc::new(MasterSecret::generate().unwrap()));
        before
            .store_refresh_token("jane", &secret("rt-1"), Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let after =
            EncryptedRefreshTokenStore::new(store.clone(), Arc::new(MasterSecret::generate().unwrap()));
        assert!(after.refresh_token("jane").await.unwrap().is_none());
        assert!(store.get_refresh_token("jane").unwrap().is_none());
    }

    #[tokio::test]
    async fn registry_tracks_stored_keys() {
        let (store, _dir) = setup();
        let registry = StoreAccessKeyRegistry::new(store);
        assert!(!registry.is_registered(&AccessKeyId::generate()).await.unwrap());
    }

    #[tokio::test]
    async fn user_directory_checks_passwords_and_scopes() {
        let (store, _dir) = setup();
        let users = StoreUserDirectory::new(store);
        let jane = UserName::new("jane").unwrap();
        users
            .put_user(jane.clone(), Some(&secret("changeit")), ScopeSet::from_claim("adm"))
            .unwrap();

        assert!(users.verify_password(&jane, &secret("changeit")).await.unwrap());
        assert!(!users.verify_password(&jane, &secret("wrong")).await.unwrap());

        let unknown = UserName::new("john").unwrap();
        assert!(!users.verify_password(&unknown, &secret("changeit")).await.unwrap());
        assert!(users.find_user(&unknown).await.unwrap().is_none());

        let info = users.find_user(&jane).await.unwrap().unwrap();
        assert!(info.scopes.contains("adm"));
    }

    #[tokio::test]
    async fn user_without_password_cannot_log_in() {
        let (store, _dir) = setup();
        let users = StoreUserDirectory::new(store);
        let svc = UserName::new("svc-monitor").unwrap();
        let first = users.put_user(svc.clone(), None, ScopeSet::new()).unwrap();

        assert!(!users.verify_password(&svc, &secret("")).await.unwrap());

        // Re-putting keeps the creation time
        let second = users
            .put_user(svc, Some(&secret("changeit")), ScopeSet::new())
            .unwrap();
        assert_eq!(first.created_at, second.created_at);
    }
}
