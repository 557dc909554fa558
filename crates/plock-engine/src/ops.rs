//! Operation execution shared by the worker and fallback paths.
//!
//! Both paths call the same [`execute`] function, so their results are
//! identical by construction. Progress phases: key derivation is bracketed
//! by boundary updates, chunk processing occupies 0–80% of an operation,
//! and final assembly 80–100% — a caller watching the percentage can tell
//! derivation stalls from encryption work.

use plock_core::{PhaseRange, PlockError, PlockResult, ProgressReporter};
use plock_crypto::envelope::{is_current_format, Envelope};
use plock_crypto::kdf::{self, Salt};
use plock_crypto::keys::ContentKey;
use plock_crypto::legacy::{decrypt_legacy, LegacyEnvelope};
use plock_crypto::{chunk, SALT_SIZE};

const CHUNK_PHASE: PhaseRange = PhaseRange::new(0, 80);
const FINALIZE_PHASE: PhaseRange = PhaseRange::new(80, 100);

/// Key material for one operation: a ready key, or a password to harden.
#[derive(Clone)]
pub(crate) enum Credential {
    Key(ContentKey),
    Password {
        password: String,
        /// Encrypt: caller-supplied salt, or `None` for a fresh random one.
        /// Decrypt: always `None` — the salt comes out of the envelope.
        salt: Option<Salt>,
        iterations: u32,
    },
}

impl Credential {
    pub(crate) fn needs_kdf(&self) -> bool {
        matches!(self, Credential::Password { .. })
    }
}

/// One dispatchable unit of work.
#[derive(Clone)]
pub(crate) enum Op {
    DeriveKey {
        password: String,
        salt: Salt,
        iterations: u32,
    },
    Encrypt {
        plaintext: Vec<u8>,
        credential: Credential,
        chunk_size: usize,
    },
    Decrypt {
        payload: Vec<u8>,
        credential: Credential,
        chunk_size: usize,
    },
}

pub(crate) enum OpOutput {
    Derived { key: ContentKey, salt: Salt },
    Encrypted(Vec<u8>),
    Decrypted(String),
}

/// Runs one operation to completion, emitting progress along the way.
pub(crate) fn execute(op: Op, reporter: &ProgressReporter) -> PlockResult<OpOutput> {
    match op {
        Op::DeriveKey {
            password,
            salt,
            iterations,
        } => {
            reporter.emit(0);
            let key = kdf::derive_key(&password, &salt, iterations);
            reporter.finish();
            Ok(OpOutput::Derived { key, salt })
        }

        Op::Encrypt {
            plaintext,
            credential,
            chunk_size,
        } => {
            reporter.emit(0);
            let (key, salt) = match credential {
                Credential::Key(key) => (key, None),
                Credential::Password {
                    password,
                    salt,
                    iterations,
                } => {
                    let salt = salt.unwrap_or_else(Salt::random);
                    let key = kdf::derive_key(&password, &salt, iterations);
                    (key, Some(*salt.as_bytes()))
                }
            };

            let envelope =
                chunk::encrypt_chunked(&key, &plaintext, chunk_size, salt, reporter, CHUNK_PHASE)?;
            let bytes = envelope.to_bytes();
            reporter.emit_scaled(FINALIZE_PHASE, 100);
            Ok(OpOutput::Encrypted(bytes))
        }

        Op::Decrypt {
            payload,
            credential,
            chunk_size,
        } => {
            reporter.emit(0);
            let plaintext = if is_current_format(&payload) {
                decrypt_current(&payload, credential, chunk_size, reporter)?
            } else {
                decrypt_legacy_format(&payload, credential)?
            };

            // Text decode happens only after every chunk authenticated;
            // partial plaintext is never surfaced.
            let text =
                String::from_utf8(plaintext).map_err(|_| PlockError::DecryptionFailed)?;
            reporter.emit_scaled(FINALIZE_PHASE, 100);
            Ok(OpOutput::Decrypted(text))
        }
    }
}

fn decrypt_current(
    payload: &[u8],
    credential: Credential,
    chunk_size: usize,
    reporter: &ProgressReporter,
) -> PlockResult<Vec<u8>> {
    match credential {
        Credential::Key(key) => {
            let envelope = Envelope::from_bytes(payload, false)?;
            chunk::decrypt_chunked(&key, &envelope, chunk_size, reporter, CHUNK_PHASE)
        }
        Credential::Password {
            password,
            iterations,
            ..
        } => {
            let envelope = Envelope::from_bytes(payload, true)?;
            let salt_bytes = envelope.salt.ok_or(PlockError::DecryptionFailed)?;
            let key = kdf::derive_key(&password, &Salt::from_bytes(salt_bytes), iterations);
            chunk::decrypt_chunked(&key, &envelope, chunk_size, reporter, CHUNK_PHASE)
        }
    }
}

/// First-byte routing is a heuristic: a stream landing here that fails the
/// legacy structural checks is indistinguishable from a corrupted current
/// envelope, so structural failures surface as the generic error too.
fn decrypt_legacy_format(payload: &[u8], credential: Credential) -> PlockResult<Vec<u8>> {
    match credential {
        Credential::Key(key) => {
            let envelope = LegacyEnvelope::from_bytes(payload, false)
                .map_err(|_| PlockError::DecryptionFailed)?;
            decrypt_legacy(&key, &envelope)
        }
        Credential::Password {
            password,
            iterations,
            ..
        } => {
            let envelope = LegacyEnvelope::from_bytes(payload, true)
                .map_err(|_| PlockError::DecryptionFailed)?;
            let salt_bytes: [u8; SALT_SIZE] =
                envelope.salt.ok_or(PlockError::DecryptionFailed)?;
            let key = kdf::derive_key(&password, &Salt::from_bytes(salt_bytes), iterations);
            decrypt_legacy(&key, &envelope)
        }
    }
}
