//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use portcullis_core::{AccessKeyId, AccessKeyName, UserName};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{AccessKeyRecord, RefreshTokenRecord, UserRecord};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes the read-check-write of the access-key name index.
    access_key_writes: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(StoreError::from)?;

        Ok(Self {
            db: Arc::new(db),
            access_key_writes: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::MissingColumnFamily(name.to_string()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(StoreError::from)
    }

    /// Look up the key id registered under `name`.
    fn key_id_by_name(&self, name: &AccessKeyName) -> Result<Option<AccessKeyId>> {
        let cf = self.cf(cf::ACCESS_KEYS_BY_NAME)?;
        self.db
            .get_cf(&cf, keys::access_key_name_key(name))
            .map_err(StoreError::from)?
            .map(|data| keys::decode_access_key_id(&data))
            .transpose()
    }

    /// Fail unless `name` is free or held by one of `owners`.
    fn ensure_name_available(&self, name: &AccessKeyName, owners: &[AccessKeyId]) -> Result<()> {
        match self.key_id_by_name(name)? {
            Some(holder) if !owners.contains(&holder) => {
                Err(StoreError::NameTaken(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Write a record and its name index. Callers hold `access_key_writes`.
    fn write_access_key(
        &self,
        record: &AccessKeyRecord,
        previous_name: Option<AccessKeyName>,
    ) -> Result<()> {
        let cf_keys = self.cf(cf::ACCESS_KEYS)?;
        let cf_by_name = self.cf(cf::ACCESS_KEYS_BY_NAME)?;

        self.ensure_name_available(&record.name, &[record.key_id])?;

        let mut batch = WriteBatch::default();

        // Renamed: drop the stale index entry
        if let Some(old) = previous_name.filter(|old| *old != record.name) {
            batch.delete_cf(&cf_by_name, keys::access_key_name_key(&old));
        }
        batch.put_cf(
            &cf_keys,
            keys::access_key_key(&record.key_id),
            Self::serialize(record)?,
        );
        batch.put_cf(
            &cf_by_name,
            keys::access_key_name_key(&record.name),
            record.key_id.as_bytes(),
        );

        self.write(batch)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Refresh Token Operations
    // =========================================================================

    fn put_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        let cf = self.cf(cf::REFRESH_TOKENS)?;
        let value = Self::serialize(record)?;

        self.db
            .put_cf(&cf, keys::refresh_token_key(&record.subject), value)
            .map_err(StoreError::from)
    }

    fn get_refresh_token(&self, subject: &str) -> Result<Option<RefreshTokenRecord>> {
        let cf = self.cf(cf::REFRESH_TOKENS)?;

        self.db
            .get_cf(&cf, keys::refresh_token_key(subject))
            .map_err(StoreError::from)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn delete_refresh_token(&self, subject: &str) -> Result<()> {
        let cf = self.cf(cf::REFRESH_TOKENS)?;

        self.db
            .delete_cf(&cf, keys::refresh_token_key(subject))
            .map_err(StoreError::from)
    }

    // =========================================================================
    // Access Key Operations
    // =========================================================================

    fn put_access_key(&self, record: &AccessKeyRecord) -> Result<()> {
        let _guard = self.access_key_writes.lock();
        let previous_name = self.get_access_key(&record.key_id)?.map(|k| k.name);
        self.write_access_key(record, previous_name)
    }

    fn update_access_key(&self, record: &AccessKeyRecord) -> Result<()> {
        let _guard = self.access_key_writes.lock();
        let current = self
            .get_access_key(&record.key_id)?
            .ok_or(StoreError::NotFound)?;
        self.write_access_key(record, Some(current.name))
    }

    fn get_access_key(&self, key_id: &AccessKeyId) -> Result<Option<AccessKeyRecord>> {
        let cf = self.cf(cf::ACCESS_KEYS)?;

        self.db
            .get_cf(&cf, keys::access_key_key(key_id))
            .map_err(StoreError::from)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_access_key_by_name(&self, name: &AccessKeyName) -> Result<Option<AccessKeyRecord>> {
        match self.key_id_by_name(name)? {
            Some(key_id) => self.get_access_key(&key_id),
            None => Ok(None),
        }
    }

    fn access_key_exists(&self, key_id: &AccessKeyId) -> Result<bool> {
        let cf = self.cf(cf::ACCESS_KEYS)?;

        self.db
            .get_pinned_cf(&cf, keys::access_key_key(key_id))
            .map(|value| value.is_some())
            .map_err(StoreError::from)
    }

    fn delete_access_key(&self, key_id: &AccessKeyId) -> Result<()> {
        let _guard = self.access_key_writes.lock();
        let cf_keys = self.cf(cf::ACCESS_KEYS)?;
        let cf_by_name = self.cf(cf::ACCESS_KEYS_BY_NAME)?;

        let record = self.get_access_key(key_id)?.ok_or(StoreError::NotFound)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_keys, keys::access_key_key(key_id));
        batch.delete_cf(&cf_by_name, keys::access_key_name_key(&record.name));

        self.write(batch)
    }

    fn list_access_keys(&self, filter: &str) -> Result<Vec<AccessKeyRecord>> {
        let cf_by_name = self.cf(cf::ACCESS_KEYS_BY_NAME)?;

        let mut records = Vec::new();
        let iter = self.db.iterator_cf(&cf_by_name, IteratorMode::Start);

        for item in iter {
            let (name, value) = item.map_err(StoreError::from)?;

            if !filter.is_empty() && !String::from_utf8_lossy(&name).contains(filter) {
                continue;
            }

            let key_id = keys::decode_access_key_id(&value)?;
            if let Some(record) = self.get_access_key(&key_id)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn replace_access_key(&self, old_id: &AccessKeyId, record: &AccessKeyRecord) -> Result<()> {
        let _guard = self.access_key_writes.lock();
        let cf_keys = self.cf(cf::ACCESS_KEYS)?;
        let cf_by_name = self.cf(cf::ACCESS_KEYS_BY_NAME)?;

        let old = self.get_access_key(old_id)?.ok_or(StoreError::NotFound)?;
        self.ensure_name_available(&record.name, &[*old_id, record.key_id])?;

        // Deletes come first so a reused name ends up pointing at the new id
        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_keys, keys::access_key_key(old_id));
        batch.delete_cf(&cf_by_name, keys::access_key_name_key(&old.name));
        batch.put_cf(
            &cf_keys,
            keys::access_key_key(&record.key_id),
            Self::serialize(record)?,
        );
        batch.put_cf(
            &cf_by_name,
            keys::access_key_name_key(&record.name),
            record.key_id.as_bytes(),
        );

        self.write(batch)?;

        tracing::debug!(old_id = %old_id, new_id = %record.key_id, "Access key replaced");
        Ok(())
    }

    // =========================================================================
    // User Operations
    // =========================================================================

    fn put_user(&self, user: &UserRecord) -> Result<()> {
        let cf = self.cf(cf::USERS)?;
        let value = Self::serialize(user)?;

        self.db
            .put_cf(&cf, keys::user_key(&user.user_name), value)
            .map_err(StoreError::from)
    }

    fn get_user(&self, user_name: &UserName) -> Result<Option<UserRecord>> {
        let cf = self.cf(cf::USERS)?;

        self.db
            .get_cf(&cf, keys::user_key(user_name))
            .map_err(StoreError::from)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn delete_user(&self, user_name: &UserName) -> Result<()> {
        let cf = self.cf(cf::USERS)?;

        if self.get_user(user_name)?.is_none() {
            return Err(StoreError::NotFound);
        }

        self.db
            .delete_cf(&cf, keys::user_key(user_name))
            .map_err(StoreError::from)
    }
}
