//! JWT encoding, decoding and signature verification.
//!
//! Two strategies share one verification path:
//!
//! - [`RsaJwtService`] signs with a single RSA key pair and verifies tokens
//!   carrying its own key id.
//! - [`JwksDecoder`] verifies against a key set, selecting the key by the
//!   `kid` header before any signature work.
//!
//! Expiry is not checked while decoding. Callers inspect
//! [`Claims::is_expired`] so a stale but genuine token can be refreshed.

use std::collections::{HashMap, HashSet};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::RsaPrivateKey;

use crate::claims::{Claims, RawClaims};
use crate::error::{AuthError, Result};
use crate::jwks::{JwkKey, JwkSet};

/// Trait for signing claim sets.
pub trait JwtEncoder: Send + Sync {
    /// Encode and sign a claim set as a compact JWT.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if the token cannot be signed.
    fn encode(&self, claims: &Claims) -> Result<String>;
}

/// Trait for verifying tokens.
pub trait JwtDecoder: Send + Sync {
    /// Verify a compact JWT and return its claims. Expired tokens decode.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the token is malformed, its key id is missing
    /// or unknown, or its signature does not verify.
    fn decode(&self, token: &str) -> Result<Claims>;
}

/// Whether `algorithm` belongs to the RSA family.
#[must_use]
pub const fn is_rsa_algorithm(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

/// The JOSE name of an algorithm.
#[must_use]
pub const fn algorithm_name(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::HS256 => "HS256",
        Algorithm::HS384 => "HS384",
        Algorithm::HS512 => "HS512",
        Algorithm::ES256 => "ES256",
        Algorithm::ES384 => "ES384",
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::PS256 => "PS256",
        Algorithm::PS384 => "PS384",
        Algorithm::PS512 => "PS512",
        Algorithm::EdDSA => "EdDSA",
    }
}

fn require_rsa(algorithm: Algorithm) -> Result<()> {
    if is_rsa_algorithm(algorithm) {
        Ok(())
    } else {
        Err(AuthError::SigningConfiguration(format!(
            "{} is not an RSA algorithm",
            algorithm_name(algorithm)
        )))
    }
}

fn validation(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    // Expiry and audience are predicates on the returned claims.
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation
}

/// Verify `token` with the key chosen by `select` for its `kid` header.
fn verify<'k>(
    token: &str,
    algorithm: Algorithm,
    select: impl FnOnce(&str) -> Option<&'k DecodingKey>,
) -> Result<Claims> {
    let header =
        decode_header(token).map_err(|e| AuthError::InvalidToken(format!("malformed token: {e}")))?;

    if header.alg != algorithm {
        return Err(AuthError::InvalidToken(format!(
            "unexpected algorithm {}",
            algorithm_name(header.alg)
        )));
    }

    let kid = header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("missing key id".to_string()))?;

    let key = select(&kid).ok_or_else(|| AuthError::InvalidToken(format!("unknown key id {kid}")))?;

    let data = decode::<RawClaims>(token, key, &validation(algorithm)).map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidToken("invalid signature".to_string()),
        _ => AuthError::InvalidToken(e.to_string()),
    })?;

    Ok(Claims::from_raw(data.claims)?.with_key_id(Some(kid)))
}

/// Single-key RSA signer and verifier.
pub struct RsaJwtService {
    algorithm: Algorithm,
    key_id: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    jwk: JwkKey,
}

impl RsaJwtService {
    /// Create an `RS256` service for the given key pair.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if the key id is empty or the key
    /// cannot be encoded.
    pub fn new(key_id: impl Into<String>, private_key: &RsaPrivateKey) -> Result<Self> {
        Self::with_algorithm(Algorithm::RS256, key_id, private_key)
    }

    /// Create a service signing with `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if `algorithm` is not an RSA algorithm,
    /// the key id is empty, or the key cannot be encoded.
    pub fn with_algorithm(
        algorithm: Algorithm,
        key_id: impl Into<String>,
        private_key: &RsaPrivateKey,
    ) -> Result<Self> {
        require_rsa(algorithm)?;

        let key_id = key_id.into();
        if key_id.trim().is_empty() {
            return Err(AuthError::SigningConfiguration(
                "key id must not be empty".to_string(),
            ));
        }

        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| AuthError::SigningConfiguration(format!("cannot encode key: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let jwk = JwkKey::rsa(&key_id, &private_key.to_public_key(), algorithm);
        let decoding_key = jwk.decoding_key()?;

        Ok(Self {
            algorithm,
            key_id,
            encoding_key,
            decoding_key,
            jwk,
        })
    }

    /// The key id placed in every token header.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The public half of the key pair as a JWK.
    #[must_use]
    pub const fn jwk(&self) -> &JwkKey {
        &self.jwk
    }

    /// The public key as a one-entry key set.
    #[must_use]
    pub fn key_set(&self) -> JwkSet {
        JwkSet::new(vec![self.jwk.clone()])
    }
}

impl JwtEncoder for RsaJwtService {
    fn encode(&self, claims: &Claims) -> Result<String> {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.key_id.clone());
        encode(&header, &claims.to_raw(), &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

impl JwtDecoder for RsaJwtService {
    fn decode(&self, token: &str) -> Result<Claims> {
        verify(token, self.algorithm, |kid| {
            (kid == self.key_id).then_some(&self.decoding_key)
        })
    }
}

impl std::fmt::Debug for RsaJwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaJwtService")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Multi-key verifier selecting the key by `kid`.
pub struct JwksDecoder {
    algorithm: Algorithm,
    keys: HashMap<String, DecodingKey>,
}

impl JwksDecoder {
    /// Create a decoder for tokens signed with `algorithm` by any key in `key_set`.
    ///
    /// Keys published for encryption and keys without an id are skipped. When
    /// several keys share an id the first one wins.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if `algorithm` is not an RSA algorithm
    /// or a signing key in the set is not a usable RSA key.
    pub fn new(algorithm: Algorithm, key_set: &JwkSet) -> Result<Self> {
        require_rsa(algorithm)?;

        let mut keys = HashMap::new();
        for jwk in &key_set.keys {
            let Some(kid) = jwk.kid.as_deref() else {
                tracing::warn!("Skipping JWK without key id");
                continue;
            };
            if jwk.is_encryption_key() {
                tracing::debug!(kid = %kid, "Skipping encryption key");
                continue;
            }
            if keys.contains_key(kid) {
                continue;
            }
            keys.insert(kid.to_string(), jwk.decoding_key()?);
        }

        Ok(Self { algorithm, keys })
    }

    /// Whether a key with this id is trusted.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// Number of trusted keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl JwtDecoder for JwksDecoder {
    fn decode(&self, token: &str) -> Result<Claims> {
        verify(token, self.algorithm, |kid| self.keys.get(kid))
    }
}

impl std::fmt::Debug for JwksDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<_> = self.keys.keys().collect();
        kids.sort();
        f.debug_struct("JwksDecoder")
            .field("algorithm", &self.algorithm)
            .field("keys", &kids)
            .finish()
    }
}
