//! Salted password hashing for the standalone login.
//!
//! Hashes are stored as `pbkdf2-sha256$<iterations>$<salt>$<hash>` with
//! unpadded base64 salt and hash, so the iteration count can be raised
//! without invalidating existing hashes.

use std::num::NonZeroU32;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{ControlError, Result};

const SCHEME: &str = "pbkdf2-sha256";
const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Hash a password with a random salt.
///
/// # Errors
///
/// Returns `ControlError::Internal` if the system random source fails.
pub fn hash_password(password: &SecretString) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| ControlError::Internal("random source unavailable".to_string()))?;

    let iterations = NonZeroU32::new(ITERATIONS).unwrap_or(NonZeroU32::MIN);
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.expose_secret().as_bytes(),
        &mut hash,
    );

    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Check a password against a stored hash. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &SecretString, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    let Ok(iterations) = iterations.parse::<NonZeroU32>() else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(hash)) else {
        return false;
    };

    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.expose_secret().as_bytes(),
        &hash,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password(&secret("changeit")).unwrap();
        assert!(hash.starts_with("pbkdf2-sha256$100000$"));
        assert!(verify_password(&secret("changeit"), &hash));
        assert!(!verify_password(&secret("Changeit"), &hash));
    }

    #[test]
    fn salts_differ() {
        let a = hash_password(&secret("changeit")).unwrap();
        let b = hash_password(&secret("changeit")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hashes_never_match() {
        for encoded in [
            "",
            "changeit",
            "md5$1$c2FsdA$aGFzaA",
            "pbkdf2-sha256$0$c2FsdA$aGFzaA",
            "pbkdf2-sha256$1000$!!$aGFzaA",
            "pbkdf2-sha256$1000$c2FsdA$aGFzaA$extra",
        ] {
            assert!(!verify_password(&secret("changeit"), encoded), "{encoded}");
        }
    }
}
