//! Request and response types for access-key management.
//!
//! These types define the API contracts of the access-key routes.

use chrono::{DateTime, Utc};
use portcullis_core::{AccessKeyName, ScopeSet};
use portcullis_store::AccessKeyRecord;
use serde::{Deserialize, Serialize};

/// Request to create a new access key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccessKeyRequest {
    /// Unique key name, also the user the key acts as.
    #[serde(rename = "accesskey_name")]
    pub name: AccessKeyName,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Scopes granted to the key.
    #[serde(default)]
    pub scopes: ScopeSet,
    /// Allowed HTTP methods; empty allows all.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Allowed path patterns; empty allows all.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Temporary keys are not registered and stop working when they expire.
    #[serde(default)]
    pub temporary: bool,
    /// Optional expiry. Required for temporary keys.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateAccessKeyRequest {
    /// Create a request for an unrestricted key without scopes.
    #[must_use]
    pub const fn new(name: AccessKeyName) -> Self {
        Self {
            name,
            description: None,
            scopes: ScopeSet::new(),
            methods: Vec::new(),
            paths: Vec::new(),
            temporary: false,
            expires_at: None,
        }
    }

    /// Grant scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
        self.scopes = scopes;
        self
    }

    /// Restrict the key to methods and paths.
    #[must_use]
    pub fn restricted_to<M, P>(
        mut self,
        methods: impl IntoIterator<Item = M>,
        paths: impl IntoIterator<Item = P>,
    ) -> Self
    where
        M: Into<String>,
        P: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Make the key temporary, expiring at `expires_at`.
    #[must_use]
    pub fn temporary_until(mut self, expires_at: DateTime<Utc>) -> Self {
        self.temporary = true;
        self.expires_at = Some(expires_at);
        self
    }
}

/// A freshly issued access key.
///
/// The signed token is returned once and never stored.
#[derive(Clone, Serialize)]
pub struct IssuedAccessKey {
    /// The registered settings.
    #[serde(flatten)]
    pub key: AccessKeyRecord,
    /// The signed access-key token.
    pub access_key: String,
}

impl std::fmt::Debug for IssuedAccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedAccessKey")
            .field("key", &self.key)
            .field("access_key", &"[redacted]")
            .finish()
    }
}

/// Result of validating a presented access key.
#[derive(Debug, Clone, Serialize)]
pub struct AccessKeyStatus {
    /// Settings carried by the token, with the registered description if any.
    #[serde(flatten)]
    pub key: AccessKeyRecord,
    /// Whether the key would authenticate a request now.
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults() {
        let json = serde_json::json!({"accesskey_name": "ci-pipeline"});
        let req: CreateAccessKeyRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.name.as_str(), "ci-pipeline");
        assert!(req.scopes.is_empty());
        assert!(req.methods.is_empty());
        assert!(!req.temporary);
        assert!(req.expires_at.is_none());
    }

    #[test]
    fn create_request_rejects_bad_name() {
        let json = serde_json::json!({"accesskey_name": "a"});
        assert!(serde_json::from_value::<CreateAccessKeyRequest>(json).is_err());
    }

    #[test]
    fn create_request_builders() {
        let req = CreateAccessKeyRequest::new(AccessKeyName::new("ci-pipeline").unwrap())
            .with_scopes(ScopeSet::from_claim("ipam"))
            .restricted_to(["GET"], ["/api/v1/elements"]);
        assert!(req.scopes.contains("ipam"));
        assert_eq!(req.methods, ["GET"]);
        assert_eq!(req.paths, ["/api/v1/elements"]);
    }
}
