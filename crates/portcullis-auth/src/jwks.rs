//! JWK and JWKS documents.
//!
//! Only RSA keys are turned into verification keys. The JSON shape follows
//! RFC 7517: a `keys` array of objects carrying `kty`, `kid`, `use`, `alg`,
//! and for RSA the base64url modulus `n` and exponent `e`.

use base64::prelude::*;
use jsonwebtoken::{Algorithm, DecodingKey};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::jwt::{algorithm_name, is_rsa_algorithm};

/// A JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// The list of keys.
    pub keys: Vec<JwkKey>,
}

impl JwkSet {
    /// Create a key set from keys.
    #[must_use]
    pub const fn new(keys: Vec<JwkKey>) -> Self {
        Self { keys }
    }

    /// Find the first key with the given key id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&JwkKey> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Key ids in document order. Keys without an id are skipped.
    #[must_use]
    pub fn key_ids(&self) -> Vec<&str> {
        self.keys.iter().filter_map(|k| k.kid.as_deref()).collect()
    }
}

/// A single JWK (JSON Web Key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkKey {
    /// Key type (e.g., "RSA").
    pub kty: String,
    /// Key ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Key use (e.g., "sig").
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Algorithm (e.g., `RS256`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus (base64url encoded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent (base64url encoded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl JwkKey {
    /// Describe an RSA public key.
    #[must_use]
    pub fn rsa(kid: impl Into<String>, key: &RsaPublicKey, algorithm: Algorithm) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: Some(kid.into()),
            key_use: Some("sig".to_string()),
            alg: Some(algorithm_name(algorithm).to_string()),
            n: Some(BASE64_URL_SAFE_NO_PAD.encode(key.n().to_bytes_be())),
            e: Some(BASE64_URL_SAFE_NO_PAD.encode(key.e().to_bytes_be())),
        }
    }

    /// Whether this is an RSA key.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        self.kty == "RSA"
    }

    /// Whether the key is published for encryption rather than signatures.
    #[must_use]
    pub fn is_encryption_key(&self) -> bool {
        self.key_use.as_deref() == Some("enc")
    }

    /// The signature algorithm declared by the key, if any.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if the declared algorithm is unknown.
    pub fn algorithm(&self) -> Result<Option<Algorithm>> {
        self.alg
            .as_deref()
            .map(|alg| {
                alg.parse::<Algorithm>().map_err(|_| {
                    AuthError::SigningConfiguration(format!("unsupported algorithm {alg}"))
                })
            })
            .transpose()
    }

    /// Build the RSA verification key.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if the key is not an RSA key, declares a
    /// non-RSA algorithm, or lacks its modulus or exponent.
    pub fn decoding_key(&self) -> Result<DecodingKey> {
        let kid = self.kid.as_deref().unwrap_or("<none>");
        if !self.is_rsa() {
            return Err(AuthError::SigningConfiguration(format!(
                "key {kid} has type {}, expected RSA",
                self.kty
            )));
        }
        if let Some(alg) = self.algorithm()? {
            if !is_rsa_algorithm(alg) {
                return Err(AuthError::SigningConfiguration(format!(
                    "key {kid} declares non-RSA algorithm {}",
                    algorithm_name(alg)
                )));
            }
        }
        let (Some(n), Some(e)) = (self.n.as_deref(), self.e.as_deref()) else {
            return Err(AuthError::SigningConfiguration(format!(
                "key {kid} is missing its modulus or exponent"
            )));
        };
        DecodingKey::from_rsa_components(n, e)
            .map_err(|err| AuthError::SigningConfiguration(format!("key {kid}: {err}")))
    }
}
