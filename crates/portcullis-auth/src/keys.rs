//! Trusted verification keys.
//!
//! Every enabled credential source contributes public keys: the access-key
//! signer, the standalone login signer and the OIDC provider. The registry
//! is built once at start-up, published as one JWKS document and used by
//! the bearer validator to verify tokens from any of those sources.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use jsonwebtoken::Algorithm;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::error::{AuthError, Result};
use crate::jwks::{JwkKey, JwkSet};
use crate::jwt::JwksDecoder;

/// Where a trusted key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySource {
    /// The access-key signer.
    AccessKeys,
    /// The OIDC provider's published key set.
    Oidc,
    /// The standalone login signer.
    StandaloneLogin,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AccessKeys => "access-keys",
            Self::Oidc => "oidc",
            Self::StandaloneLogin => "standalone-login",
        })
    }
}

/// A public key trusted for token verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedKey {
    /// The contributing source.
    pub source: KeySource,
    /// The key as published.
    pub jwk: JwkKey,
}

impl TrustedKey {
    /// The key id.
    #[must_use]
    pub fn key_id(&self) -> &str {
        self.jwk.kid.as_deref().unwrap_or_default()
    }
}

/// The aggregated set of trusted keys.
pub struct TrustedKeyRegistry {
    keys: Vec<TrustedKey>,
    decoder: JwksDecoder,
}

impl TrustedKeyRegistry {
    /// Start collecting keys for `algorithm`.
    #[must_use]
    pub fn builder(algorithm: Algorithm) -> TrustedKeyRegistryBuilder {
        TrustedKeyRegistryBuilder {
            algorithm,
            keys: Vec::new(),
        }
    }

    /// The trusted keys in contribution order.
    #[must_use]
    pub fn keys(&self) -> &[TrustedKey] {
        &self.keys
    }

    /// Find a key by id.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&TrustedKey> {
        self.keys.iter().find(|k| k.key_id() == kid)
    }

    /// Sorted key ids.
    #[must_use]
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.keys.iter().map(TrustedKey::key_id).collect();
        ids.sort_unstable();
        ids
    }

    /// The published JWKS document.
    #[must_use]
    pub fn key_set(&self) -> JwkSet {
        JwkSet::new(self.keys.iter().map(|k| k.jwk.clone()).collect())
    }

    /// A verifier over all trusted keys.
    #[must_use]
    pub const fn decoder(&self) -> &JwksDecoder {
        &self.decoder
    }
}

impl fmt::Debug for TrustedKeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedKeyRegistry")
            .field("keys", &self.key_ids())
            .finish()
    }
}

/// Builder for [`TrustedKeyRegistry`].
#[derive(Debug)]
#[must_use]
pub struct TrustedKeyRegistryBuilder {
    algorithm: Algorithm,
    keys: Vec<TrustedKey>,
}

impl TrustedKeyRegistryBuilder {
    /// Contribute a single key.
    pub fn add_key(mut self, source: KeySource, jwk: JwkKey) -> Self {
        self.keys.push(TrustedKey { source, jwk });
        self
    }

    /// Contribute every signing key of a key set.
    pub fn add_key_set(mut self, source: KeySource, set: &JwkSet) -> Self {
        for jwk in &set.keys {
            self = self.add_key(source, jwk.clone());
        }
        self
    }

    /// Deduplicate by key id and build the verifier.
    ///
    /// Keys without id and encryption keys are dropped. When ids collide the
    /// first contribution wins.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if the algorithm is not RSA or a key
    /// is unusable.
    pub fn build(self) -> Result<TrustedKeyRegistry> {
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(self.keys.len());
        for key in self.keys {
            let Some(kid) = key.jwk.kid.clone() else {
                tracing::warn!(source = %key.source, "Ignoring trusted key without id");
                continue;
            };
            if key.jwk.is_encryption_key() {
                continue;
            }
            if !seen.insert(kid.clone()) {
                tracing::warn!(kid = %kid, source = %key.source, "Ignoring duplicate trusted key");
                continue;
            }
            keys.push(key);
        }

        let set = JwkSet::new(keys.iter().map(|k| k.jwk.clone()).collect());
        let decoder = JwksDecoder::new(self.algorithm, &set)?;
        let registry = TrustedKeyRegistry { keys, decoder };

        tracing::info!(keys = ?registry.key_ids(), "Trusted key set built");
        Ok(registry)
    }
}

/// Load a PKCS#8 PEM private key, generating and saving a 2048-bit key
/// when the file does not exist.
///
/// # Errors
///
/// Returns `SigningConfiguration` if the file cannot be read, parsed or
/// written.
pub fn load_or_generate_key(path: &Path) -> Result<RsaPrivateKey> {
    if path.exists() {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            AuthError::SigningConfiguration(format!("cannot read {}: {e}", path.display()))
        })?;
        return RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| {
            AuthError::SigningConfiguration(format!("cannot parse {}: {e}", path.display()))
        });
    }

    tracing::info!(path = %path.display(), "Generating signing key");
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)
        .map_err(|e| AuthError::SigningConfiguration(format!("key generation failed: {e}")))?;
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AuthError::SigningConfiguration(format!("cannot encode key: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AuthError::SigningConfiguration(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(path, pem.as_bytes()).map_err(|e| {
        AuthError::SigningConfiguration(format!("cannot write {}: {e}", path.display()))
    })?;
    Ok(key)
}
