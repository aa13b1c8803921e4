//! Key encoding utilities for `RocksDB`.
//!
//! Names are stored as their UTF-8 bytes, so iterating the name index yields
//! records in byte order of their names.

use portcullis_core::{AccessKeyId, AccessKeyName, UserName};

use crate::error::{Result, StoreError};

/// Encode a refresh-token key (the subject bytes).
#[must_use]
pub fn refresh_token_key(subject: &str) -> Vec<u8> {
    subject.as_bytes().to_vec()
}

/// Encode an access-key key (the 16 id bytes).
#[must_use]
pub fn access_key_key(key_id: &AccessKeyId) -> Vec<u8> {
    key_id.as_bytes().to_vec()
}

/// Encode a name index key.
#[must_use]
pub fn access_key_name_key(name: &AccessKeyName) -> Vec<u8> {
    name.as_str().as_bytes().to_vec()
}

/// Decode the key id stored as a name index value.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the value is not 16 bytes.
pub fn decode_access_key_id(value: &[u8]) -> Result<AccessKeyId> {
    let bytes: [u8; 16] = value
        .try_into()
        .map_err(|_| StoreError::Serialization(format!("bad key id length {}", value.len())))?;
    Ok(AccessKeyId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Encode a user key (the user name bytes).
#[must_use]
pub fn user_key(user_name: &UserName) -> Vec<u8> {
    user_name.as_str().as_bytes().to_vec()
}
