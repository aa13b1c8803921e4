//! Master secret for encrypting stored refresh tokens.
//!
//! Ciphertexts are AES-256-GCM with a random 96-bit nonce, encoded as
//! base64 of `nonce || ciphertext || tag`. The AES key is the SHA-256 digest
//! of the configured secret, so any secret length is accepted.

use base64::prelude::*;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{AuthError, Result};

/// Symmetric key for refresh-token encryption.
pub struct MasterSecret {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl MasterSecret {
    /// Derive the encryption key from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the secret is empty.
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::Configuration(
                "master secret must not be empty".to_string(),
            ));
        }
        let derived = digest(&SHA256, secret);
        let unbound = UnboundKey::new(&AES_256_GCM, derived.as_ref())
            .map_err(|_| AuthError::Encryption("cannot create key".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Derive the encryption key from a base64-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the value is not base64 or is empty.
    pub fn from_base64(secret: &SecretString) -> Result<Self> {
        let bytes = BASE64_STANDARD
            .decode(secret.expose_secret().trim())
            .map_err(|e| AuthError::Configuration(format!("master secret is not base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Generate a random secret valid for this process only.
    ///
    /// # Errors
    ///
    /// Returns `Encryption` if the system random source fails.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 32];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| AuthError::Encryption("random source failed".to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Encrypt `plaintext` and return the base64 encoding.
    ///
    /// # Errors
    ///
    /// Returns `Encryption` if sealing fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| AuthError::Encryption("random source failed".to_string()))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| AuthError::Encryption("seal failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&in_out);
        Ok(BASE64_STANDARD.encode(out))
    }

    /// Decrypt a value produced by [`MasterSecret::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `Encryption` if the value is malformed or was not produced
    /// with this secret.
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>> {
        let data = BASE64_STANDARD
            .decode(encoded)
            .map_err(|_| AuthError::Encryption("ciphertext is not base64".to_string()))?;
        if data.len() < NONCE_LEN {
            return Err(AuthError::Encryption("ciphertext too short".to_string()));
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| AuthError::Encryption("bad nonce".to_string()))?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| AuthError::Encryption("decryption failed".to_string()))?;
        Ok(plaintext.to_vec())
    }

    /// Encrypt a secret string.
    ///
    /// # Errors
    ///
    /// Returns `Encryption` if sealing fails.
    pub fn encrypt_secret(&self, secret: &SecretString) -> Result<String> {
        self.encrypt(secret.expose_secret().as_bytes())
    }

    /// Decrypt into a secret string.
    ///
    /// # Errors
    ///
    /// Returns `Encryption` if decryption fails or the plaintext is not UTF-8.
    pub fn decrypt_secret(&self, encoded: &str) -> Result<SecretString> {
        let plaintext = self.decrypt(encoded)?;
        String::from_utf8(plaintext)
            .map(SecretString::new)
            .map_err(|_| AuthError::Encryption("plaintext is not UTF-8".to_string()))
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}
