//! Identifier types for portcullis.
//!
//! User names and access-key names are validated strings; access-key ids are
//! random UUIDs. All of them serialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 64;

fn validate_name(s: &str) -> Result<(), IdError> {
    let len = s.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(IdError::InvalidLength {
            min: MIN_NAME_LEN,
            max: MAX_NAME_LEN,
            got: len,
        });
    }
    if let Some(c) = s.chars().find(|c| !c.is_ascii_graphic()) {
        return Err(IdError::InvalidCharacter(c));
    }
    Ok(())
}

/// The name of an authenticated principal.
///
/// Between 2 and 64 printable ASCII characters, no whitespace. OIDC subjects,
/// `preferred_username` values and access-key names all fit this shape.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserName(String);

impl UserName {
    /// Parse and validate a user name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is too short, too long, or contains
    /// whitespace or non-ASCII characters.
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserName({})", self.0)
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserName> for String {
    fn from(name: UserName) -> Self {
        name.0
    }
}

impl AsRef<str> for UserName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A 16-byte access-key identifier based on UUID v4.
///
/// The id is the revocation handle of an access key: a key is valid only
/// while a record with this id exists in the registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKeyId(uuid::Uuid);

impl AccessKeyId {
    /// Create a new `AccessKeyId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random `AccessKeyId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Return the bytes of the UUID.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl FromStr for AccessKeyId {
    type Err = IdError;

    /// Parse an `AccessKeyId` from a UUID string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for AccessKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessKeyId({})", self.0)
    }
}

impl fmt::Display for AccessKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AccessKeyId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccessKeyId> for String {
    fn from(id: AccessKeyId) -> Self {
        id.0.to_string()
    }
}

impl AsRef<[u8]> for AccessKeyId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// The unique, human-readable name of an access key.
///
/// Follows the same rules as [`UserName`] because a key authenticates as
/// the principal carrying its name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKeyName(String);

impl AccessKeyName {
    /// Parse and validate an access-key name.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`UserName::new`].
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The principal an access key with this name authenticates as.
    #[must_use]
    pub fn to_user_name(&self) -> UserName {
        UserName(self.0.clone())
    }
}

impl From<&UserName> for AccessKeyName {
    fn from(name: &UserName) -> Self {
        Self(name.0.clone())
    }
}

impl FromStr for AccessKeyName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for AccessKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessKeyName({})", self.0)
    }
}

impl fmt::Display for AccessKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccessKeyName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccessKeyName> for String {
    fn from(name: AccessKeyName) -> Self {
        name.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input has an incorrect length.
    #[error("invalid length: expected {min} to {max} characters, got {got}")]
    InvalidLength {
        /// The minimum number of characters.
        min: usize,
        /// The maximum number of characters.
        max: usize,
        /// The actual number of characters.
        got: usize,
    },

    /// The input contains a character outside printable ASCII.
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_name_accepts_email_like_names() {
        let name = UserName::new("jane.doe@example.com").unwrap();
        assert_eq!(name.as_str(), "jane.doe@example.com");
        assert_eq!(name.to_string(), "jane.doe@example.com");
    }

    #[test]
    fn user_name_rejects_whitespace() {
        let result = UserName::new("jane doe");
        assert!(matches!(result, Err(IdError::InvalidCharacter(' '))));
    }

    #[test]
    fn user_name_length_bounds() {
        assert!(matches!(
            UserName::new("j"),
            Err(IdError::InvalidLength { got: 1, .. })
        ));
        assert!(UserName::new("jd").is_ok());
        assert!(UserName::new("a".repeat(64)).is_ok());
        assert!(UserName::new("a".repeat(65)).is_err());
    }

    #[test]
    fn user_name_serde_json() {
        let name = UserName::new("admin").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"admin\"");
        let parsed: UserName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);

        let invalid: Result<UserName, _> = serde_json::from_str("\"a\"");
        assert!(invalid.is_err());
    }

    #[test]
    fn access_key_id_roundtrip() {
        let id = AccessKeyId::generate();
        let parsed = AccessKeyId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn access_key_id_invalid_uuid() {
        let result = AccessKeyId::from_str("not-a-uuid");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }

    #[test]
    fn access_key_id_serde_json() {
        let id = AccessKeyId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: AccessKeyId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn access_key_name_maps_to_user_name() {
        let name = AccessKeyName::new("metrics-exporter").unwrap();
        assert_eq!(name.to_user_name().as_str(), "metrics-exporter");

        let back = AccessKeyName::from(&name.to_user_name());
        assert_eq!(back, name);
    }
}
