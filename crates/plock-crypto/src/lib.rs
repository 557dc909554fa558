//! plock-crypto: content encryption for pastelock
//!
//! Architecture: chunked AES-256-GCM inside a versioned binary envelope
//!
//! Current envelope format:
//! ```text
//! [1 byte: format version][12 bytes: base nonce][16 bytes: salt]?[chunk*]
//! chunk = [ciphertext || 16-byte auth tag], no per-chunk length prefix
//! chunk nonce(i) = base nonce with last 4 bytes XOR'd with BE32(i)
//! ```
//!
//! The salt is present iff the key was derived from a password
//! (PBKDF2-HMAC-SHA256, adaptive iteration count). Envelopes whose first
//! byte is not the current format version are routed to the legacy adapter:
//! `[16 bytes: salt]?[24 bytes: nonce][ciphertext || tag]`, opened in a
//! single XChaCha20-Poly1305 call.

pub mod chunk;
pub mod codec;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod legacy;

pub use chunk::{decrypt_chunked, derive_chunk_nonce, encrypt_chunked};
pub use codec::{decode, encode};
pub use envelope::{is_current_format, Envelope, FORMAT_VERSION};
pub use kdf::{derive_key, Salt, SizeHint};
pub use keys::{generate_key, ContentKey};
pub use legacy::{decrypt_legacy, encrypt_legacy, LegacyEnvelope};

/// Size of a symmetric content key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a password salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of the legacy XChaCha20-Poly1305 nonce (192-bit)
pub const LEGACY_NONCE_SIZE: usize = 24;

/// Size of an authentication tag
pub const TAG_SIZE: usize = 16;
