//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Encrypted refresh tokens, keyed by token subject.
    pub const REFRESH_TOKENS: &str = "refresh_tokens";

    /// Primary access-key records, keyed by `key_id`.
    pub const ACCESS_KEYS: &str = "access_keys";

    /// Unique index: access keys by name, `name -> key_id`.
    pub const ACCESS_KEYS_BY_NAME: &str = "access_keys_by_name";

    /// User records, keyed by user name.
    pub const USERS: &str = "users";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::REFRESH_TOKENS,
        cf::ACCESS_KEYS,
        cf::ACCESS_KEYS_BY_NAME,
        cf::USERS,
    ]
}
