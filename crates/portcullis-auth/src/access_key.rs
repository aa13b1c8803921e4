//! API access keys.
//!
//! An access key is a long-lived credential for system-to-system calls. It
//! travels as a JWT signed with the reserved [`API_KEY_ID`] key:
//!
//! | Claim       | Content                                   |
//! |-------------|-------------------------------------------|
//! | `jti`/`sub` | the key id, its revocation handle         |
//! | `name`      | the key name, which is also its owner     |
//! | `scope`     | granted scopes, space separated           |
//! | `methods`   | allowed HTTP methods, space separated     |
//! | `paths`     | allowed path patterns, space separated    |
//! | `temporary` | `"true"` for temporary keys               |
//!
//! A key is revoked by removing its id from the [`AccessKeyRegistry`].
//! Temporary keys are never registered and are revoked once expired.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use portcullis_core::{AccessKeyId, AccessKeyName, ScopeSet, UserName};

use crate::claims::Claims;
use crate::error::{AuthError, Result};
use crate::identity::AccessKeyRegistry;
use crate::jwt::{JwtDecoder, JwtEncoder, RsaJwtService};

/// Key id of the access-key signing key.
pub const API_KEY_ID: &str = "api-key";

/// Issuer of access-key tokens.
pub const ACCESS_KEY_ISSUER: &str = "portcullis";

const NAME_CLAIM: &str = "name";
const METHODS_CLAIM: &str = "methods";
const PATHS_CLAIM: &str = "paths";
const TEMPORARY_CLAIM: &str = "temporary";

/// Settings of an access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiAccessKey {
    id: AccessKeyId,
    name: AccessKeyName,
    scopes: ScopeSet,
    methods: BTreeSet<String>,
    paths: BTreeSet<String>,
    temporary: bool,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl ApiAccessKey {
    /// Start building a key called `name` with a fresh id.
    pub fn builder(name: AccessKeyName) -> ApiAccessKeyBuilder {
        ApiAccessKeyBuilder::new(name)
    }

    /// The key id.
    #[must_use]
    pub const fn id(&self) -> AccessKeyId {
        self.id
    }

    /// The key name.
    #[must_use]
    pub const fn name(&self) -> &AccessKeyName {
        &self.name
    }

    /// The principal requests authenticate as.
    #[must_use]
    pub fn owner(&self) -> UserName {
        self.name.to_user_name()
    }

    /// Granted scopes.
    #[must_use]
    pub const fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Allowed methods, upper case. Empty allows every method.
    #[must_use]
    pub const fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// Allowed path patterns. Empty allows every path.
    #[must_use]
    pub const fn paths(&self) -> &BTreeSet<String> {
        &self.paths
    }

    /// Whether the key is temporary.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiry time, if any.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether `method` may be used with this key. Case-insensitive.
    #[must_use]
    pub fn is_method_allowed(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(&method.to_ascii_uppercase())
    }

    /// Whether `path` may be accessed with this key.
    ///
    /// A pattern matches exactly, or as a prefix when it ends with `*`.
    #[must_use]
    pub fn is_path_allowed(&self, path: &str) -> bool {
        self.paths.is_empty()
            || self.paths.iter().any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => path.starts_with(prefix),
                None => pattern == path,
            })
    }

    /// Whether the key had expired at `now`. Keys without expiry never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Whether the key has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// The same settings under a fresh id, created at `now`.
    #[must_use]
    pub fn renewed(&self, now: DateTime<Utc>) -> Self {
        Self {
            id: AccessKeyId::generate(),
            created_at: truncate(now),
            ..self.clone()
        }
    }

    /// The claim set encoding this key.
    #[must_use]
    pub fn to_claims(&self) -> Claims {
        let mut builder = Claims::builder()
            .jwt_id(self.id.to_string())
            .subject(self.id.to_string())
            .issuer(ACCESS_KEY_ISSUER)
            .issued_at(self.created_at)
            .expires_at_opt(self.expires_at)
            .scopes(self.scopes.clone())
            .claim(NAME_CLAIM, self.name.as_str());
        if !self.methods.is_empty() {
            builder = builder.claim(METHODS_CLAIM, join(&self.methods));
        }
        if !self.paths.is_empty() {
            builder = builder.claim(PATHS_CLAIM, join(&self.paths));
        }
        if self.temporary {
            builder = builder.claim(TEMPORARY_CLAIM, "true");
        }
        builder.build()
    }

    /// Read a key back from its claim set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the id or name claims are missing or malformed.
    pub fn from_claims(claims: &Claims) -> Result<Self> {
        let id = claims
            .jwt_id()
            .or_else(|| claims.subject())
            .ok_or_else(|| AuthError::InvalidToken("access key without id".to_string()))?
            .parse::<AccessKeyId>()
            .map_err(|e| AuthError::InvalidToken(format!("access key id: {e}")))?;
        let name = claims
            .claim_str(NAME_CLAIM)
            .ok_or_else(|| AuthError::InvalidToken("access key without name".to_string()))?
            .parse::<AccessKeyName>()
            .map_err(|e| AuthError::InvalidToken(format!("access key name: {e}")))?;

        Ok(Self {
            id,
            name,
            scopes: claims.scopes().clone(),
            methods: split(claims.claim_str(METHODS_CLAIM)),
            paths: split(claims.claim_str(PATHS_CLAIM)),
            temporary: claims.claim_str(TEMPORARY_CLAIM) == Some("true"),
            created_at: claims.issued_at().unwrap_or_else(Utc::now),
            expires_at: claims.expires_at(),
        })
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn split(claim: Option<&str>) -> BTreeSet<String> {
    claim
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn truncate(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

/// Builder for [`ApiAccessKey`].
#[derive(Debug)]
#[must_use]
pub struct ApiAccessKeyBuilder {
    key: ApiAccessKey,
}

impl ApiAccessKeyBuilder {
    fn new(name: AccessKeyName) -> Self {
        Self {
            key: ApiAccessKey {
                id: AccessKeyId::generate(),
                name,
                scopes: ScopeSet::new(),
                methods: BTreeSet::new(),
                paths: BTreeSet::new(),
                temporary: false,
                created_at: truncate(Utc::now()),
                expires_at: None,
            },
        }
    }

    /// Use a specific id instead of a fresh one.
    pub const fn id(mut self, id: AccessKeyId) -> Self {
        self.key.id = id;
        self
    }

    /// Replace the granted scopes.
    pub fn scopes(mut self, scopes: ScopeSet) -> Self {
        self.key.scopes = scopes;
        self
    }

    /// Allow these methods only.
    pub fn methods<S: AsRef<str>>(mut self, methods: impl IntoIterator<Item = S>) -> Self {
        self.key.methods = methods
            .into_iter()
            .map(|m| m.as_ref().trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    /// Allow these path patterns only.
    pub fn paths<S: AsRef<str>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.key.paths = paths
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// Mark the key temporary.
    pub const fn temporary(mut self, temporary: bool) -> Self {
        self.key.temporary = temporary;
        self
    }

    /// Set the creation time.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.key.created_at = truncate(at);
        self
    }

    /// Set or clear the expiry.
    pub fn expires_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.key.expires_at = at.map(truncate);
        self
    }

    /// Finish the key.
    #[must_use]
    pub fn build(self) -> ApiAccessKey {
        self.key
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Encodes access keys as tokens signed with the [`API_KEY_ID`] key.
#[derive(Debug)]
pub struct AccessKeyCodec {
    signer: Arc<RsaJwtService>,
}

impl AccessKeyCodec {
    /// Create a codec over the access-key signer.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if the signer's key id is not [`API_KEY_ID`].
    pub fn new(signer: Arc<RsaJwtService>) -> Result<Self> {
        if signer.key_id() != API_KEY_ID {
            return Err(AuthError::SigningConfiguration(format!(
                "access keys must be signed with key id {API_KEY_ID}, got {}",
                signer.key_id()
            )));
        }
        Ok(Self { signer })
    }

    /// The signer.
    #[must_use]
    pub fn signer(&self) -> &RsaJwtService {
        &self.signer
    }

    /// Encode a key as a signed token.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if signing fails.
    pub fn encode(&self, key: &ApiAccessKey) -> Result<String> {
        self.signer.encode(&key.to_claims())
    }

    /// Verify a token and read the key it carries. Expired keys decode.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the token does not verify or does not
    /// carry an access key.
    pub fn decode(&self, token: &str) -> Result<ApiAccessKey> {
        ApiAccessKey::from_claims(&self.signer.decode(token)?)
    }
}

/// Whether decoded claims belong to an access-key token.
#[must_use]
pub fn is_access_key(claims: &Claims) -> bool {
    claims.key_id() == Some(API_KEY_ID)
}

/// Whether `key` is revoked at `now`.
///
/// # Errors
///
/// Returns an error if the registry cannot be consulted.
pub async fn is_revoked(
    key: &ApiAccessKey,
    registry: &dyn AccessKeyRegistry,
    now: DateTime<Utc>,
) -> Result<bool> {
    if key.is_temporary() {
        return Ok(key.is_expired_at(now));
    }
    Ok(!registry.is_registered(&key.id()).await?)
}

// ============================================================================
// Validator for administrative inspection
// ============================================================================

/// Outcome of inspecting a presented access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyValidation {
    /// The decoded key.
    pub key: ApiAccessKey,
    /// Whether the key would authenticate now.
    pub valid: bool,
}

/// Decodes access keys presented to the validate and restore operations.
///
/// The caller is inspecting somebody else's key rather than authenticating,
/// so undecodable input is reported as `UnprocessableToken`.
pub struct AccessKeyValidator {
    codec: Arc<AccessKeyCodec>,
    registry: Arc<dyn AccessKeyRegistry>,
}

impl AccessKeyValidator {
    /// Create a validator.
    #[must_use]
    pub fn new(codec: Arc<AccessKeyCodec>, registry: Arc<dyn AccessKeyRegistry>) -> Self {
        Self { codec, registry }
    }

    /// Decode a presented key.
    ///
    /// # Errors
    ///
    /// Returns `UnprocessableToken` if the token cannot be decoded.
    pub fn decode(&self, token: &str) -> Result<ApiAccessKey> {
        self.codec.decode(token.trim()).map_err(|e| {
            tracing::debug!(error = %e, "Rejecting undecodable access key");
            AuthError::UnprocessableToken("access key cannot be processed".to_string())
        })
    }

    /// Decode a presented key and check it is neither expired nor revoked.
    ///
    /// # Errors
    ///
    /// Returns `UnprocessableToken` if the token cannot be decoded, or the
    /// registry error if revocation cannot be checked.
    pub async fn validate(&self, token: &str) -> Result<AccessKeyValidation> {
        let key = self.decode(token)?;
        let now = Utc::now();
        let valid = !key.is_expired_at(now) && !is_revoked(&key, self.registry.as_ref(), now).await?;
        Ok(AccessKeyValidation { key, valid })
    }
}

impl std::fmt::Debug for AccessKeyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeyValidator")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
