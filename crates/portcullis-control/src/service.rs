//! Access-key management service.
//!
//! This module provides the `AccessKeyControl` trait and the store-backed
//! `AccessKeyService` implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use portcullis_auth::{AccessKeyCodec, AccessKeyValidator, ApiAccessKey};
use portcullis_core::AccessKeyId;
use portcullis_store::{AccessKeyRecord, Store, StoreError};

use crate::adapters::StoreAccessKeyRegistry;
use crate::error::{ControlError, Result};
use crate::types::{AccessKeyStatus, CreateAccessKeyRequest, IssuedAccessKey};

/// Trait defining the access-key management operations.
#[async_trait]
pub trait AccessKeyControl: Send + Sync {
    /// Create and sign a new access key.
    ///
    /// Temporary keys are signed but not registered.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DuplicateKeyName` if the name is taken, or
    /// `ControlError::InvalidRequest` for a temporary key without expiry.
    async fn create_access_key(&self, request: CreateAccessKeyRequest) -> Result<IssuedAccessKey>;

    /// List keys whose name contains `filter`, sorted by name.
    async fn list_access_keys(&self, filter: &str) -> Result<Vec<AccessKeyRecord>>;

    /// Get a registered key.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AccessKeyNotFound` if the key doesn't exist.
    async fn get_access_key(&self, key_id: &AccessKeyId) -> Result<AccessKeyRecord>;

    /// Replace the description of a key.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AccessKeyNotFound` if the key doesn't exist.
    async fn update_description(
        &self,
        key_id: &AccessKeyId,
        description: Option<String>,
    ) -> Result<AccessKeyRecord>;

    /// Revoke a key. Removing an unknown key succeeds.
    async fn remove_access_key(&self, key_id: &AccessKeyId) -> Result<()>;

    /// Revoke a key and issue its settings under a new id in one write.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AccessKeyNotFound` if the key doesn't exist.
    async fn renew_access_key(&self, key_id: &AccessKeyId) -> Result<IssuedAccessKey>;

    /// Inspect a presented token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnprocessableToken` (as `ControlError::Auth`) if
    /// the token cannot be decoded.
    async fn validate_access_key(&self, token: &str) -> Result<AccessKeyStatus>;

    /// Register the key carried by a token again, under its original id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnprocessableToken` (as `ControlError::Auth`) if
    /// the token cannot be decoded, or `ControlError::DuplicateKeyName` if a
    /// different key now uses the name.
    async fn restore_access_key(&self, token: &str) -> Result<AccessKeyRecord>;
}

/// The store-backed access-key service.
pub struct AccessKeyService<S: Store> {
    store: Arc<S>,
    codec: Arc<AccessKeyCodec>,
    validator: AccessKeyValidator,
}

impl<S: Store + 'static> AccessKeyService<S> {
    /// Create a new access-key service.
    #[must_use]
    pub fn new(store: Arc<S>, codec: Arc<AccessKeyCodec>) -> Self {
        let registry = Arc::new(StoreAccessKeyRegistry::new(store.clone()));
        let validator = AccessKeyValidator::new(codec.clone(), registry);
        Self {
            store,
            codec,
            validator,
        }
    }
}

impl<S: Store> AccessKeyService<S> {
    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn load(&self, key_id: &AccessKeyId) -> Result<AccessKeyRecord> {
        self.store
            .get_access_key(key_id)?
            .ok_or(ControlError::AccessKeyNotFound(*key_id))
    }

    /// Store a record, reporting a taken name as `DuplicateKeyName`.
    fn register(&self, record: &AccessKeyRecord) -> Result<()> {
        self.store.put_access_key(record).map_err(|e| match e {
            StoreError::NameTaken(_) => ControlError::DuplicateKeyName(record.name.clone()),
            other => ControlError::Store(other),
        })
    }

    fn issue(&self, key: &ApiAccessKey, record: AccessKeyRecord) -> Result<IssuedAccessKey> {
        Ok(IssuedAccessKey {
            access_key: self.codec.encode(key)?,
            key: record,
        })
    }
}

fn to_record(key: &ApiAccessKey, description: Option<String>) -> AccessKeyRecord {
    AccessKeyRecord {
        key_id: key.id(),
        name: key.name().clone(),
        description,
        scopes: key.scopes().clone(),
        methods: key.methods().clone(),
        paths: key.paths().clone(),
        temporary: key.is_temporary(),
        created_at: key.created_at(),
        expires_at: key.expires_at(),
    }
}

fn to_key(record: &AccessKeyRecord) -> ApiAccessKey {
    ApiAccessKey::builder(record.name.clone())
        .id(record.key_id)
        .scopes(record.scopes.clone())
        .methods(&record.methods)
        .paths(&record.paths)
        .temporary(record.temporary)
        .created_at(record.created_at)
        .expires_at(record.expires_at)
        .build()
}

#[async_trait]
impl<S: Store + 'static> AccessKeyControl for AccessKeyService<S> {
    async fn create_access_key(&self, request: CreateAccessKeyRequest) -> Result<IssuedAccessKey> {
        if request.temporary && request.expires_at.is_none() {
            return Err(ControlError::InvalidRequest(
                "temporary access keys need an expiry".to_string(),
            ));
        }

        let key = ApiAccessKey::builder(request.name)
            .scopes(request.scopes)
            .methods(&request.methods)
            .paths(&request.paths)
            .temporary(request.temporary)
            .created_at(Utc::now())
            .expires_at(request.expires_at)
            .build();
        let record = to_record(&key, request.description);

        if key.is_temporary() {
            tracing::info!(key_id = %key.id(), name = %key.name(), "Temporary access key issued");
        } else {
            self.register(&record)?;
            tracing::info!(key_id = %key.id(), name = %key.name(), "Access key created");
        }

        self.issue(&key, record)
    }

    async fn list_access_keys(&self, filter: &str) -> Result<Vec<AccessKeyRecord>> {
        Ok(self.store.list_access_keys(filter)?)
    }

    async fn get_access_key(&self, key_id: &AccessKeyId) -> Result<AccessKeyRecord> {
        self.load(key_id)
    }

    async fn update_description(
        &self,
        key_id: &AccessKeyId,
        description: Option<String>,
    ) -> Result<AccessKeyRecord> {
        let mut record = self.load(key_id)?;
        record.description = description.filter(|d| !d.trim().is_empty());
        self.store.update_access_key(&record).map_err(|e| match e {
            StoreError::NotFound => ControlError::AccessKeyNotFound(*key_id),
            StoreError::NameTaken(_) => ControlError::DuplicateKeyName(record.name.clone()),
            other => ControlError::Store(other),
        })?;
        Ok(record)
    }

    async fn remove_access_key(&self, key_id: &AccessKeyId) -> Result<()> {
        match self.store.delete_access_key(key_id) {
            Ok(()) => {
                tracing::info!(key_id = %key_id, "Access key revoked");
                Ok(())
            }
            Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn renew_access_key(&self, key_id: &AccessKeyId) -> Result<IssuedAccessKey> {
        let old = self.load(key_id)?;
        let renewed = to_key(&old).renewed(Utc::now());
        let record = to_record(&renewed, old.description);

        self.store
            .replace_access_key(key_id, &record)
            .map_err(|e| match e {
                StoreError::NotFound => ControlError::AccessKeyNotFound(*key_id),
                StoreError::NameTaken(_) => ControlError::DuplicateKeyName(record.name.clone()),
                other => ControlError::Store(other),
            })?;

        tracing::info!(old_id = %key_id, new_id = %renewed.id(), name = %renewed.name(), "Access key renewed");
        self.issue(&renewed, record)
    }

    async fn validate_access_key(&self, token: &str) -> Result<AccessKeyStatus> {
        let validation = self.validator.validate(token).await?;
        let description = self
            .store
            .get_access_key(&validation.key.id())?
            .and_then(|r| r.description);

        Ok(AccessKeyStatus {
            key: to_record(&validation.key, description),
            valid: validation.valid,
        })
    }

    async fn restore_access_key(&self, token: &str) -> Result<AccessKeyRecord> {
        let key = self.validator.decode(token)?;
        if key.is_temporary() {
            return Err(ControlError::InvalidRequest(
                "temporary access keys cannot be restored".to_string(),
            ));
        }

        if let Some(existing) = self.store.get_access_key(&key.id())? {
            return Ok(existing);
        }

        let record = to_record(&key, None);
        self.register(&record)?;
        tracing::info!(key_id = %key.id(), name = %key.name(), "Access key restored");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use http::Method;
    use jsonwebtoken::Algorithm;
    use portcullis_auth::testing::{self, access_key_codec};
    use portcullis_auth::{
        AccessTokenValidator, AuthError, BearerTokenValidator, KeySource, ResponseCookies,
        TrustedKeyRegistry, Verdict,
    };
    use portcullis_core::{AccessKeyName, ScopeSet, UserName};
    use portcullis_store::{RefreshTokenRecord, RocksStore, UserRecord};
    use tempfile::TempDir;

    fn setup() -> (AccessKeyService<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let service = AccessKeyService::new(store, Arc::new(access_key_codec()));
        (service, dir)
    }

    fn name(s: &str) -> AccessKeyName {
        AccessKeyName::new(s).unwrap()
    }

    fn request(s: &str) -> CreateAccessKeyRequest {
        CreateAccessKeyRequest::new(name(s)).with_scopes(ScopeSet::from_claim("ipam"))
    }

    #[tokio::test]
    async fn create_registers_and_signs() {
        let (service, _dir) = setup();
        let issued = service
            .create_access_key(request("ci-pipeline").restricted_to(["get", "PUT"], ["/api/v1/elements"]))
            .await
            .unwrap();

        let stored = service.get_access_key(&issued.key.key_id).await.unwrap();
        assert_eq!(stored, issued.key);

        let decoded = access_key_codec().decode(&issued.access_key).unwrap();
        assert_eq!(decoded.id(), issued.key.key_id);
        assert_eq!(decoded.owner().as_str(), "ci-pipeline");
        assert!(decoded.is_method_allowed("GET"));
        assert!(!decoded.is_method_allowed("DELETE"));
        assert!(decoded.is_path_allowed("/api/v1/elements"));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let (service, _dir) = setup();
        service.create_access_key(request("ci-pipeline")).await.unwrap();

        let result = service.create_access_key(request("ci-pipeline")).await;
        assert!(matches!(result, Err(ControlError::DuplicateKeyName(n)) if n.as_str() == "ci-pipeline"));
    }

    #[tokio::test]
    async fn temporary_keys_are_not_registered() {
        let (service, _dir) = setup();

        let result = service
            .create_access_key(CreateAccessKeyRequest {
                temporary: true,
                ..request("tmp-key")
            })
            .await;
        assert!(matches!(result, Err(ControlError::InvalidRequest(_))));

        let issued = service
            .create_access_key(request("tmp-key").temporary_until(Utc::now() + Duration::minutes(5)))
            .await
            .unwrap();
        assert!(service.store().get_access_key(&issued.key.key_id).unwrap().is_none());

        let status = service.validate_access_key(&issued.access_key).await.unwrap();
        assert!(status.valid);
    }

    #[tokio::test]
    async fn list_filters_by_name() {
        let (service, _dir) = setup();
        for n in ["monitoring", "ci-nightly", "ci-pipeline"] {
            service.create_access_key(request(n)).await.unwrap();
        }

        let names = |keys: Vec<AccessKeyRecord>| {
            keys.into_iter().map(|k| k.name.to_string()).collect::<Vec<_>>()
        };
        assert_eq!(
            names(service.list_access_keys("").await.unwrap()),
            ["ci-nightly", "ci-pipeline", "monitoring"]
        );
        assert_eq!(
            names(service.list_access_keys("ci").await.unwrap()),
            ["ci-nightly", "ci-pipeline"]
        );
    }

    #[tokio::test]
    async fn update_description() {
        let (service, _dir) = setup();
        let issued = service.create_access_key(request("ci-pipeline")).await.unwrap();

        service
            .update_description(&issued.key.key_id, Some("nightly builds".to_string()))
            .await
            .unwrap();
        let stored = service.get_access_key(&issued.key.key_id).await.unwrap();
        assert_eq!(stored.description.as_deref(), Some("nightly builds"));

        let missing = service
            .update_description(&AccessKeyId::generate(), None)
            .await;
        assert!(matches!(missing, Err(ControlError::AccessKeyNotFound(_))));
    }

    /// Deletes a key right after handing out its record once armed, as a
    /// concurrent remove landing between read and write would.
    struct RevokeAfterRead {
        inner: RocksStore,
        armed: std::sync::atomic::AtomicBool,
    }

    impl Store for RevokeAfterRead {
        fn put_refresh_token(&self, record: &RefreshTokenRecord) -> portcullis_store::Result<()> {
            self.inner.put_refresh_token(record)
        }
        fn get_refresh_token(
            &self,
            subject: &str,
        ) -> portcullis_store::Result<Option<RefreshTokenRecord>> {
            self.inner.get_refresh_token(subject)
        }
        fn delete_refresh_token(&self, subject: &str) -> portcullis_store::Result<()> {
            self.inner.delete_refresh_token(subject)
        }
        fn put_access_key(&self, record: &AccessKeyRecord) -> portcullis_store::Result<()> {
            self.inner.put_access_key(record)
        }
        fn update_access_key(&self, record: &AccessKeyRecord) -> portcullis_store::Result<()> {
            self.inner.update_access_key(record)
        }
        fn get_access_key(
            &self,
            key_id: &AccessKeyId,
        ) -> portcullis_store::Result<Option<AccessKeyRecord>> {
            let record = self.inner.get_access_key(key_id)?;
            if self.armed.swap(false, std::sync::atomic::Ordering::SeqCst) {
                self.inner.delete_access_key(key_id)?;
            }
            Ok(record)
        }
        fn get_access_key_by_name(
            &self,
            name: &AccessKeyName,
        ) -> portcullis_store::Result<Option<AccessKeyRecord>> {
            self.inner.get_access_key_by_name(name)
        }
        fn access_key_exists(&self, key_id: &AccessKeyId) -> portcullis_store::Result<bool> {
            self.inner.access_key_exists(key_id)
        }
        fn delete_access_key(&self, key_id: &AccessKeyId) -> portcullis_store::Result<()> {
            self.inner.delete_access_key(key_id)
        }
        fn list_access_keys(&self, filter: &str) -> portcullis_store::Result<Vec<AccessKeyRecord>> {
            self.inner.list_access_keys(filter)
        }
        fn replace_access_key(
            &self,
            old_id: &AccessKeyId,
            record: &AccessKeyRecord,
        ) -> portcullis_store::Result<()> {
            self.inner.replace_access_key(old_id, record)
        }
        fn put_user(&self, user: &UserRecord) -> portcullis_store::Result<()> {
            self.inner.put_user(user)
        }
        fn get_user(&self, user_name: &UserName) -> portcullis_store::Result<Option<UserRecord>> {
            self.inner.get_user(user_name)
        }
        fn delete_user(&self, user_name: &UserName) -> portcullis_store::Result<()> {
            self.inner.delete_user(user_name)
        }
    }

    #[tokio::test]
    async fn update_racing_remove_keeps_key_revoked() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RevokeAfterRead {
            inner: RocksStore::open(dir.path()).unwrap(),
            armed: std::sync::atomic::AtomicBool::new(false),
        });
        let service = AccessKeyService::new(Arc::clone(&store), Arc::new(access_key_codec()));
        let issued = service.create_access_key(request("ci-pipeline")).await.unwrap();

        store.armed.store(true, std::sync::atomic::Ordering::SeqCst);
        let result = service
            .update_description(&issued.key.key_id, Some("nightly builds".to_string()))
            .await;

        assert!(matches!(result, Err(ControlError::AccessKeyNotFound(_))));
        assert!(!store.access_key_exists(&issued.key.key_id).unwrap());
        assert!(store.get_access_key_by_name(&issued.key.name).unwrap().is_none());

        let status = service.validate_access_key(&issued.access_key).await.unwrap();
        assert!(!status.valid);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (service, _dir) = setup();
        let issued = service.create_access_key(request("ci-pipeline")).await.unwrap();

        service.remove_access_key(&issued.key.key_id).await.unwrap();
        service.remove_access_key(&issued.key.key_id).await.unwrap();

        assert!(matches!(
            service.get_access_key(&issued.key.key_id).await,
            Err(ControlError::AccessKeyNotFound(_))
        ));
        let status = service.validate_access_key(&issued.access_key).await.unwrap();
        assert!(!status.valid);
    }

    #[tokio::test]
    async fn renew_revokes_old_id_and_keeps_settings() {
        let (service, _dir) = setup();
        let original = service
            .create_access_key(request("ci-pipeline").restricted_to(["GET"], ["/api/v1/*"]))
            .await
            .unwrap();

        let renewed = service.renew_access_key(&original.key.key_id).await.unwrap();
        assert_ne!(renewed.key.key_id, original.key.key_id);
        assert_eq!(renewed.key.name, original.key.name);
        assert_eq!(renewed.key.scopes, original.key.scopes);
        assert_eq!(renewed.key.methods, original.key.methods);
        assert_eq!(renewed.key.paths, original.key.paths);

        let old = service.validate_access_key(&original.access_key).await.unwrap();
        assert!(!old.valid);

        let new = service.validate_access_key(&renewed.access_key).await.unwrap();
        assert!(new.valid);
        assert_eq!(new.key.name.as_str(), "ci-pipeline");
        assert!(new.key.scopes.contains("ipam"));

        assert_eq!(service.list_access_keys("").await.unwrap().len(), 1);
        assert!(matches!(
            service.renew_access_key(&original.key.key_id).await,
            Err(ControlError::AccessKeyNotFound(_))
        ));
    }

    async fn bearer_verdict(validator: &BearerTokenValidator, token: &str) -> Verdict {
        let auth = format!("Bearer {token}");
        let req = testing::request(
            Method::GET,
            "/api/v1/elements",
            &[("authorization", auth.as_str())],
        );
        validator
            .validate(&req, &mut ResponseCookies::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn renewed_key_authenticates_and_old_one_does_not() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let codec = Arc::new(access_key_codec());
        let trusted = TrustedKeyRegistry::builder(Algorithm::RS256)
            .add_key(KeySource::AccessKeys, codec.signer().jwk().clone())
            .build()
            .unwrap();
        let bearer = BearerTokenValidator::new(
            Arc::new(trusted),
            Arc::new(StoreAccessKeyRegistry::new(store.clone())),
        );
        let service = AccessKeyService::new(store, codec);

        let original = service.create_access_key(request("ci-pipeline")).await.unwrap();
        assert!(matches!(
            bearer_verdict(&bearer, &original.access_key).await,
            Verdict::Valid(_)
        ));

        let renewed = service.renew_access_key(&original.key.key_id).await.unwrap();

        assert_eq!(
            bearer_verdict(&bearer, &original.access_key).await,
            Verdict::Invalid
        );
        assert_eq!(
            bearer_verdict(&bearer, &renewed.access_key).await,
            Verdict::valid("ci-pipeline".parse().unwrap(), ScopeSet::from_claim("ipam"))
        );
    }

    #[tokio::test]
    async fn restore_reregisters_a_removed_key() {
        let (service, _dir) = setup();
        let issued = service.create_access_key(request("ci-pipeline")).await.unwrap();
        service.remove_access_key(&issued.key.key_id).await.unwrap();

        let restored = service.restore_access_key(&issued.access_key).await.unwrap();
        assert_eq!(restored.key_id, issued.key.key_id);
        assert_eq!(restored.name, issued.key.name);
        assert!(service.validate_access_key(&issued.access_key).await.unwrap().valid);

        // Restoring a registered key changes nothing
        let again = service.restore_access_key(&issued.access_key).await.unwrap();
        assert_eq!(again, restored);
    }

    #[tokio::test]
    async fn restore_conflicts_with_a_reused_name() {
        let (service, _dir) = setup();
        let issued = service.create_access_key(request("ci-pipeline")).await.unwrap();
        service.remove_access_key(&issued.key.key_id).await.unwrap();
        service.create_access_key(request("ci-pipeline")).await.unwrap();

        assert!(matches!(
            service.restore_access_key(&issued.access_key).await,
            Err(ControlError::DuplicateKeyName(_))
        ));
    }

    #[tokio::test]
    async fn garbage_is_unprocessable() {
        let (service, _dir) = setup();
        for token in ["", "not-a-token", "a.b.c"] {
            assert!(matches!(
                service.validate_access_key(token).await,
                Err(ControlError::Auth(AuthError::UnprocessableToken(_)))
            ));
            assert!(matches!(
                service.restore_access_key(token).await,
                Err(ControlError::Auth(AuthError::UnprocessableToken(_)))
            ));
        }
    }
}
