//! Key derivation: PBKDF2-HMAC-SHA256 passphrase → content key
//!
//! The iteration count adapts to payload size: the same derivation runs
//! again on decrypt, so multi-megabyte payloads trade some hardening for
//! latency (the chunked encryption already dominates their cost).

use pbkdf2::pbkdf2_hmac;
use plock_core::config::KdfConfig;
use plock_core::{PlockError, PlockResult};
use rand::RngCore;
use sha2::Sha256;

use crate::keys::ContentKey;
use crate::{KEY_SIZE, SALT_SIZE};

/// A 16-byte password salt, random or caller-supplied.
///
/// Embedded in the envelope when the key is password-derived, so the
/// password alone is enough to decrypt.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt {
    bytes: [u8; SALT_SIZE],
}

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Caller-supplied salts arrive through the text codec, so a wrong
    /// length is a malformed input, not a key-length problem.
    pub fn from_slice(bytes: &[u8]) -> PlockResult<Self> {
        if bytes.len() != SALT_SIZE {
            return Err(PlockError::MalformedEncoding);
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(bytes);
        Ok(Self { bytes: salt })
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Salt({})", crate::codec::encode(&self.bytes))
    }
}

/// Payload-size hint selecting the iteration count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeHint {
    Normal,
    Large,
}

impl SizeHint {
    /// Classifies a payload against the configured threshold.
    pub fn for_len(payload_len: usize, config: &KdfConfig) -> Self {
        if payload_len > config.large_payload_threshold {
            SizeHint::Large
        } else {
            SizeHint::Normal
        }
    }

    pub fn iterations(&self, config: &KdfConfig) -> u32 {
        match self {
            SizeHint::Normal => config.iterations_normal,
            SizeHint::Large => config.iterations_large,
        }
    }
}

/// Derives a 256-bit content key from a password and salt.
///
/// Deterministic for a fixed `(password, salt, iterations)` triple; decrypt
/// depends on reproducing the encryption key exactly. Progress for the
/// derivation is synthesized by the caller at phase boundaries — PBKDF2
/// exposes no native progress signal and polling it would be worse than
/// silence.
pub fn derive_key(password: &str, salt: &Salt, iterations: u32) -> ContentKey {
    let mut out = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    tracing::debug!(iterations, "derived content key");
    ContentKey::from_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Full-strength iteration counts make the suite crawl; determinism and
    // divergence hold for any count.
    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn test_kdf_deterministic() {
        let salt = Salt::from_bytes([1u8; SALT_SIZE]);
        let k1 = derive_key("correct horse battery staple", &salt, TEST_ITERATIONS);
        let k2 = derive_key("correct horse battery staple", &salt, TEST_ITERATIONS);
        assert_eq!(k1.as_bytes(), k2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_passwords() {
        let salt = Salt::from_bytes([1u8; SALT_SIZE]);
        let k1 = derive_key("password-a", &salt, TEST_ITERATIONS);
        let k2 = derive_key("password-b", &salt, TEST_ITERATIONS);
        assert_ne!(
            k1.as_bytes(),
            k2.as_bytes(),
            "different passwords must produce different keys"
        );
    }

    #[test]
    fn test_kdf_different_salts() {
        let k1 = derive_key("same-password", &Salt::from_bytes([1u8; 16]), TEST_ITERATIONS);
        let k2 = derive_key("same-password", &Salt::from_bytes([2u8; 16]), TEST_ITERATIONS);
        assert_ne!(
            k1.as_bytes(),
            k2.as_bytes(),
            "different salts must produce different keys"
        );
    }

    #[test]
    fn test_kdf_iteration_count_matters() {
        let salt = Salt::from_bytes([1u8; SALT_SIZE]);
        let k1 = derive_key("pw", &salt, TEST_ITERATIONS);
        let k2 = derive_key("pw", &salt, TEST_ITERATIONS + 1);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_kdf_no_collisions_across_random_trials() {
        use rand::Rng;
        let salt = Salt::from_bytes([7u8; SALT_SIZE]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let pw: String = (0..12)
                .map(|_| rand::thread_rng().gen_range('a'..='z'))
                .collect();
            let key = derive_key(&pw, &salt, 10);
            seen.insert(*key.as_bytes());
        }
        // a few random 12-char passwords may collide as strings, never as keys
        assert!(seen.len() >= 99);
    }

    #[test]
    fn test_size_hint_threshold() {
        let config = KdfConfig::default();
        assert_eq!(SizeHint::for_len(0, &config), SizeHint::Normal);
        assert_eq!(
            SizeHint::for_len(config.large_payload_threshold, &config),
            SizeHint::Normal
        );
        assert_eq!(
            SizeHint::for_len(config.large_payload_threshold + 1, &config),
            SizeHint::Large
        );
        assert_eq!(SizeHint::Normal.iterations(&config), 300_000);
        assert_eq!(SizeHint::Large.iterations(&config), 100_000);
    }

    #[test]
    fn test_salt_from_slice_rejects_wrong_length() {
        assert!(Salt::from_slice(&[0u8; 15]).is_err());
        assert!(Salt::from_slice(&[0u8; 17]).is_err());
        assert!(Salt::from_slice(&[0u8; 16]).is_ok());
    }
}
