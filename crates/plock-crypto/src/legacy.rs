//! Legacy adapter: decrypt-only support for the pre-versioned format
//!
//! ```text
//! [16 bytes: salt]?[24 bytes: nonce][ciphertext || 16-byte tag]
//! ```
//!
//! The predecessor scheme used XChaCha20-Poly1305 with a 24-byte nonce and
//! never chunked: the whole ciphertext opens in one call, and that behavior
//! is preserved bit-for-bit. There is no version byte; streams whose first
//! byte differs from the current `FORMAT_VERSION` land here.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use plock_core::{PlockError, PlockResult};
use rand::RngCore;

use crate::keys::ContentKey;
use crate::{LEGACY_NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Decoded legacy envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEnvelope {
    pub salt: Option<[u8; SALT_SIZE]>,
    pub nonce: [u8; LEGACY_NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl LegacyEnvelope {
    /// Decodes a legacy stream, expecting a salt iff `expect_salt`.
    pub fn from_bytes(bytes: &[u8], expect_salt: bool) -> PlockResult<Self> {
        let salt_len = if expect_salt { SALT_SIZE } else { 0 };
        let min = salt_len + LEGACY_NONCE_SIZE + TAG_SIZE;
        if bytes.len() < min {
            return Err(PlockError::TruncatedEnvelope {
                len: bytes.len(),
                min,
            });
        }

        let salt = if expect_salt {
            let mut salt = [0u8; SALT_SIZE];
            salt.copy_from_slice(&bytes[..SALT_SIZE]);
            Some(salt)
        } else {
            None
        };

        let mut nonce = [0u8; LEGACY_NONCE_SIZE];
        nonce.copy_from_slice(&bytes[salt_len..salt_len + LEGACY_NONCE_SIZE]);

        Ok(LegacyEnvelope {
            salt,
            nonce,
            ciphertext: bytes[salt_len + LEGACY_NONCE_SIZE..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let salt_len = self.salt.map_or(0, |_| SALT_SIZE);
        let mut out =
            Vec::with_capacity(salt_len + LEGACY_NONCE_SIZE + self.ciphertext.len());
        if let Some(salt) = &self.salt {
            out.extend_from_slice(salt);
        }
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}

/// Opens a legacy envelope in a single call. No chunking is attempted.
pub fn decrypt_legacy(key: &ContentKey, envelope: &LegacyEnvelope) -> PlockResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(
            XNonce::from_slice(&envelope.nonce),
            envelope.ciphertext.as_slice(),
        )
        .map_err(|_| PlockError::DecryptionFailed)
}

/// Produces a legacy-format envelope.
///
/// Retained solely so tests can exercise historical vectors; new content is
/// always written in the current versioned format.
pub fn encrypt_legacy(
    key: &ContentKey,
    plaintext: &[u8],
    salt: Option<[u8; SALT_SIZE]>,
) -> PlockResult<LegacyEnvelope> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce = [0u8; LEGACY_NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| PlockError::Encryption(format!("legacy seal failed: {e}")))?;

    Ok(LegacyEnvelope {
        salt,
        nonce,
        ciphertext,
    })
}
