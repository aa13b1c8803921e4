//! `RocksDB` storage layer for portcullis.
//!
//! This crate provides persistent storage for refresh tokens, API access keys
//! and users using `RocksDB` with column families for indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `refresh_tokens`: Encrypted refresh tokens, keyed by token subject
//! - `access_keys`: Primary access-key records, keyed by `key_id`
//! - `access_keys_by_name`: Unique name index, `name -> key_id`
//! - `users`: User records for the standalone login
//!
//! # Example
//!
//! ```no_run
//! use portcullis_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/portcullis-db").unwrap();
//!
//! // All access keys whose name contains "ci"
//! let keys = store.list_access_keys("ci").unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{AccessKeyRecord, RefreshTokenRecord, UserRecord};

use portcullis_core::{AccessKeyId, AccessKeyName, UserName};

/// Persistence for refresh tokens, access keys and users.
///
/// Access-key writes keep the name index consistent with the primary records.
pub trait Store: Send + Sync {
    // =========================================================================
    // Refresh Token Operations
    // =========================================================================

    /// Insert or replace the refresh token of a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()>;

    /// Get the refresh token of a subject, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_refresh_token(&self, subject: &str) -> Result<Option<RefreshTokenRecord>>;

    /// Delete the refresh token of a subject. Deleting a missing token is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_refresh_token(&self, subject: &str) -> Result<()>;

    // =========================================================================
    // Access Key Operations
    // =========================================================================

    /// Insert or update an access-key record.
    ///
    /// This also maintains the unique name index.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NameTaken` if another key already uses the name.
    fn put_access_key(&self, record: &AccessKeyRecord) -> Result<()>;

    /// Overwrite a registered access-key record.
    ///
    /// Unlike `put_access_key` this never registers an id, so an update
    /// racing with a delete cannot bring a revoked key back.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if `record.key_id` isn't registered, or
    /// `StoreError::NameTaken` if another key already uses the name.
    fn update_access_key(&self, record: &AccessKeyRecord) -> Result<()>;

    /// Get an access key by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_access_key(&self, key_id: &AccessKeyId) -> Result<Option<AccessKeyRecord>>;

    /// Get an access key by its unique name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_access_key_by_name(&self, name: &AccessKeyName) -> Result<Option<AccessKeyRecord>>;

    /// Check whether an access key ID is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn access_key_exists(&self, key_id: &AccessKeyId) -> Result<bool>;

    /// Delete an access key by ID.
    ///
    /// This also removes the key from the name index.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the key doesn't exist.
    fn delete_access_key(&self, key_id: &AccessKeyId) -> Result<()>;

    /// List access keys whose name contains `filter`, sorted by name.
    ///
    /// An empty filter lists all keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_access_keys(&self, filter: &str) -> Result<Vec<AccessKeyRecord>>;

    /// Replace the key `old_id` with `record` in a single write.
    ///
    /// Afterwards `old_id` is no longer registered and `record.key_id` is.
    /// Readers never observe both or neither.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if `old_id` doesn't exist, or
    /// `StoreError::NameTaken` if the new name belongs to a third key.
    fn replace_access_key(&self, old_id: &AccessKeyId, record: &AccessKeyRecord) -> Result<()>;

    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert or update a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_user(&self, user: &UserRecord) -> Result<()>;

    /// Get a user by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_name: &UserName) -> Result<Option<UserRecord>>;

    /// Delete a user by name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    fn delete_user(&self, user_name: &UserName) -> Result<()>;
}
