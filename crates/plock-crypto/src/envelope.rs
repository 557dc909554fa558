//! Versioned binary envelope: encode/decode of the current wire format
//!
//! ```text
//! [1 byte: version][12 bytes: base nonce][16 bytes: salt]?[ciphertext || tags]
//! ```
//!
//! The version byte uniquely selects the decoding algorithm; unknown
//! versions are rejected, never guessed. Salt presence is decided by the
//! caller's context (password-derived or not) — the format carries no flag
//! for it.

use plock_core::{PlockError, PlockResult};

use crate::{NONCE_SIZE, SALT_SIZE};

/// The only version this codec writes or reads. The legacy format has no
/// reserved version space, so this byte never legally starts a legacy
/// stream — first-byte inspection is the whole detection heuristic.
pub const FORMAT_VERSION: u8 = 0x01;

/// Decoded current-format envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: u8,
    pub base_nonce: [u8; NONCE_SIZE],
    /// Present iff the key was derived from a password.
    pub salt: Option<[u8; SALT_SIZE]>,
    /// Concatenated sealed chunks, no length prefixes.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn to_bytes(&self) -> Vec<u8> {
        let salt_len = self.salt.map_or(0, |_| SALT_SIZE);
        let mut out = Vec::with_capacity(1 + NONCE_SIZE + salt_len + self.ciphertext.len());
        out.push(self.version);
        out.extend_from_slice(&self.base_nonce);
        if let Some(salt) = &self.salt {
            out.extend_from_slice(salt);
        }
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decodes an envelope, expecting a salt iff `expect_salt`.
    pub fn from_bytes(bytes: &[u8], expect_salt: bool) -> PlockResult<Self> {
        let min = 1 + NONCE_SIZE + if expect_salt { SALT_SIZE } else { 0 };
        if bytes.is_empty() {
            return Err(PlockError::TruncatedEnvelope { len: 0, min });
        }

        let version = bytes[0];
        if version != FORMAT_VERSION {
            return Err(PlockError::UnsupportedVersion(version));
        }
        if bytes.len() < min {
            return Err(PlockError::TruncatedEnvelope {
                len: bytes.len(),
                min,
            });
        }

        let mut base_nonce = [0u8; NONCE_SIZE];
        base_nonce.copy_from_slice(&bytes[1..1 + NONCE_SIZE]);

        let (salt, body_start) = if expect_salt {
            let mut salt = [0u8; SALT_SIZE];
            salt.copy_from_slice(&bytes[1 + NONCE_SIZE..1 + NONCE_SIZE + SALT_SIZE]);
            (Some(salt), 1 + NONCE_SIZE + SALT_SIZE)
        } else {
            (None, 1 + NONCE_SIZE)
        };

        Ok(Envelope {
            version,
            base_nonce,
            salt,
            ciphertext: bytes[body_start..].to_vec(),
        })
    }
}

/// First-byte probe used by the dispatcher to route current vs legacy.
pub fn is_current_format(bytes: &[u8]) -> bool {
    bytes.first() == Some(&FORMAT_VERSION)
}
