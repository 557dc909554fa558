//! plock-engine: execution dispatcher and public operations for pastelock.
//!
//! Routes derive/encrypt/decrypt to a lazily-created background worker and
//! unifies the worker and caller-thread paths behind one asynchronous
//! contract with progress callbacks. Any worker-path failure is retried
//! exactly once on the caller's thread; only a failure that reproduces
//! there reaches the caller.
//!
//! ```no_run
//! # async fn demo() -> plock_core::PlockResult<()> {
//! use plock_engine::Engine;
//!
//! let engine = Engine::global();
//! let key = engine.generate_key(None);
//! let sealed = engine.encrypt("hello", &key, false, None, None).await?;
//! let opened = engine.decrypt(&sealed, &key, false, None).await?;
//! assert_eq!(opened, "hello");
//! # Ok(())
//! # }
//! ```

mod ops;
mod strategy;
mod worker;

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use plock_core::{
    EngineConfig, Operation, PlockResult, ProgressFn, ProgressReporter,
};
use plock_crypto::codec;
use plock_crypto::envelope::is_current_format;
use plock_crypto::kdf::{Salt, SizeHint};
use plock_crypto::keys::{self, ContentKey};
use plock_crypto::{LEGACY_NONCE_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use ops::{execute, Credential, Op, OpOutput};
use strategy::{choose_strategy, Strategy};
use worker::{Job, WorkerHandle};

pub use plock_core::{PlockError, ProgressUpdate};

/// Result of a password derivation: both halves base64-encoded, ready for
/// the storage collaborator.
#[derive(Clone)]
pub struct DerivedKeyMaterial {
    pub key: String,
    pub salt: String,
}

/// The content encryption engine.
///
/// Owns the configuration and the process-wide worker handle. The handle is
/// a lazily-initialized singleton behind a mutex: the first caller to need
/// the worker creates it, concurrent callers await the same instance.
pub struct Engine {
    config: EngineConfig,
    worker: Mutex<Option<WorkerHandle>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            worker: Mutex::new(None),
        }
    }

    /// Process-wide engine with default configuration.
    pub fn global() -> &'static Engine {
        static GLOBAL: OnceLock<Engine> = OnceLock::new();
        GLOBAL.get_or_init(|| Engine::new(EngineConfig::default()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generates a fresh random content key, base64-encoded.
    ///
    /// Cheap enough to run on the caller's thread; the progress stream still
    /// gets its terminal update for API uniformity.
    pub fn generate_key(&self, progress: Option<ProgressFn>) -> String {
        let reporter = ProgressReporter::new(Operation::DeriveKey, Uuid::new_v4(), progress);
        let key = keys::generate_key();
        let encoded = codec::encode(key.as_bytes());
        reporter.finish();
        encoded
    }

    /// Derives a key from a password, generating a random salt when none is
    /// supplied. Deterministic for a fixed `(password, salt)` pair.
    pub async fn derive_key(
        &self,
        password: &str,
        salt: Option<&str>,
        progress: Option<ProgressFn>,
    ) -> PlockResult<DerivedKeyMaterial> {
        let salt = match salt {
            Some(encoded) => Salt::from_slice(&codec::decode(encoded)?)?,
            None => Salt::random(),
        };
        let op = Op::DeriveKey {
            password: password.to_string(),
            salt,
            iterations: SizeHint::Normal.iterations(&self.config.kdf),
        };
        let reporter = ProgressReporter::new(Operation::DeriveKey, Uuid::new_v4(), progress);

        match self.dispatch(op, reporter, 0, true).await? {
            OpOutput::Derived { key, salt } => Ok(DerivedKeyMaterial {
                key: codec::encode(key.as_bytes()),
                salt: codec::encode(salt.as_bytes()),
            }),
            _ => Err(PlockError::WorkerUnavailable),
        }
    }

    /// Encrypts plaintext under a base64 key or a password, returning the
    /// base64 envelope.
    ///
    /// With `password_derived`, the salt (caller-supplied or fresh) is
    /// embedded in the envelope so the password alone decrypts it later.
    pub async fn encrypt(
        &self,
        plaintext: &str,
        key_or_password: &str,
        password_derived: bool,
        salt: Option<&str>,
        progress: Option<ProgressFn>,
    ) -> PlockResult<String> {
        let credential =
            self.build_credential(key_or_password, password_derived, salt, plaintext.len())?;
        let needs_kdf = credential.needs_kdf();
        let op = Op::Encrypt {
            plaintext: plaintext.as_bytes().to_vec(),
            credential,
            chunk_size: self.config.crypto.chunk_size,
        };
        let reporter = ProgressReporter::new(Operation::Encrypt, Uuid::new_v4(), progress);

        match self.dispatch(op, reporter, plaintext.len(), needs_kdf).await? {
            OpOutput::Encrypted(bytes) => Ok(codec::encode(&bytes)),
            _ => Err(PlockError::WorkerUnavailable),
        }
    }

    /// Decrypts a base64 envelope, probing for the legacy format first.
    ///
    /// Envelope text and key are validated before any cryptographic work;
    /// the complete original plaintext comes back or a typed error does.
    pub async fn decrypt(
        &self,
        envelope: &str,
        key_or_password: &str,
        password_derived: bool,
        progress: Option<ProgressFn>,
    ) -> PlockResult<String> {
        let payload = codec::decode(envelope)?;
        let content_len =
            plaintext_len_estimate(&payload, password_derived, self.config.crypto.chunk_size);
        let credential =
            self.build_credential(key_or_password, password_derived, None, content_len)?;
        let needs_kdf = credential.needs_kdf();
        let payload_len = payload.len();
        let op = Op::Decrypt {
            payload,
            credential,
            chunk_size: self.config.crypto.chunk_size,
        };
        let reporter = ProgressReporter::new(Operation::Decrypt, Uuid::new_v4(), progress);

        match self.dispatch(op, reporter, payload_len, needs_kdf).await? {
            OpOutput::Decrypted(text) => Ok(text),
            _ => Err(PlockError::WorkerUnavailable),
        }
    }

    /// `content_len` is the plaintext length (actual on encrypt, recovered
    /// from the envelope on decrypt) so both sides classify KDF cost from
    /// the same quantity.
    fn build_credential(
        &self,
        key_or_password: &str,
        password_derived: bool,
        salt: Option<&str>,
        content_len: usize,
    ) -> PlockResult<Credential> {
        if password_derived {
            let salt = match salt {
                Some(encoded) => Some(Salt::from_slice(&codec::decode(encoded)?)?),
                None => None,
            };
            let hint = SizeHint::for_len(content_len, &self.config.kdf);
            Ok(Credential::Password {
                password: key_or_password.to_string(),
                salt,
                iterations: hint.iterations(&self.config.kdf),
            })
        } else {
            let key = ContentKey::from_slice(&codec::decode(key_or_password)?)?;
            Ok(Credential::Key(key))
        }
    }

    /// Routes one operation per the chosen strategy. The worker path is
    /// retried exactly once on the caller's thread — the swap never recurses
    /// and `WorkerUnavailable` never escapes.
    async fn dispatch(
        &self,
        op: Op,
        reporter: ProgressReporter,
        payload_len: usize,
        needs_kdf: bool,
    ) -> PlockResult<OpOutput> {
        match choose_strategy(payload_len, needs_kdf, &self.config.worker) {
            Strategy::Direct => execute(op, &reporter),
            Strategy::Worker => {
                let retry_op = op.clone();
                match self.run_on_worker(op, reporter.clone()).await {
                    Ok(output) => Ok(output),
                    Err(err) => {
                        warn!(error = %err, "worker path failed, retrying on caller thread");
                        execute(retry_op, &reporter)
                    }
                }
            }
        }
    }

    async fn run_on_worker(
        &self,
        op: Op,
        reporter: ProgressReporter,
    ) -> PlockResult<OpOutput> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            op,
            reporter,
            reply: reply_tx,
        };
        self.submit_job(job)?;

        reply_rx
            .await
            .map_err(|_| PlockError::WorkerUnavailable)?
    }

    /// Queues a job, lazily (re)creating the worker. The mutex makes first
    /// use race-free: one caller spawns, the rest reuse the same handle.
    fn submit_job(&self, job: Job) -> PlockResult<()> {
        let mut guard = self
            .worker
            .lock()
            .map_err(|_| PlockError::WorkerUnavailable)?;

        let job = match guard.take() {
            Some(handle) => match handle.submit(job) {
                Ok(()) => {
                    *guard = Some(handle);
                    return Ok(());
                }
                // the worker idled out since last use; spawn a fresh one
                Err(job) => job,
            },
            None => job,
        };

        debug!("spawning background worker");
        let idle = Duration::from_secs(self.config.worker.idle_timeout_secs);
        let handle = WorkerHandle::spawn(idle)?;
        handle
            .submit(job)
            .map_err(|_| PlockError::WorkerUnavailable)?;
        *guard = Some(handle);
        Ok(())
    }
}

/// Convenience wrappers over [`Engine::global`].
pub async fn derive_key(
    password: &str,
    salt: Option<&str>,
    progress: Option<ProgressFn>,
) -> PlockResult<DerivedKeyMaterial> {
    Engine::global().derive_key(password, salt, progress).await
}

pub fn generate_key(progress: Option<ProgressFn>) -> String {
    Engine::global().generate_key(progress)
}

pub async fn encrypt(
    plaintext: &str,
    key_or_password: &str,
    password_derived: bool,
    salt: Option<&str>,
    progress: Option<ProgressFn>,
) -> PlockResult<String> {
    Engine::global()
        .encrypt(plaintext, key_or_password, password_derived, salt, progress)
        .await
}

pub async fn decrypt(
    envelope: &str,
    key_or_password: &str,
    password_derived: bool,
    progress: Option<ProgressFn>,
) -> PlockResult<String> {
    Engine::global()
        .decrypt(envelope, key_or_password, password_derived, progress)
        .await
}

/// Recovers the plaintext length implied by an envelope.
///
/// The adaptive iteration count is chosen from the plaintext size on
/// encrypt; decrypt must classify from the same quantity, not the raw
/// envelope length, or content near the threshold derives a different key.
/// The sealed-chunk count is exact: the write side never emits an empty
/// trailing chunk, so each sealed chunk is at least `TAG_SIZE + 1` bytes
/// except a lone single-shot one.
fn plaintext_len_estimate(payload: &[u8], password_derived: bool, chunk_size: usize) -> usize {
    let salt_len = if password_derived { SALT_SIZE } else { 0 };
    if !is_current_format(payload) {
        return payload
            .len()
            .saturating_sub(salt_len + LEGACY_NONCE_SIZE + TAG_SIZE);
    }

    let ct = payload.len().saturating_sub(1 + NONCE_SIZE + salt_len);
    let sealed_size = chunk_size + TAG_SIZE;
    let chunk_count = if ct <= sealed_size {
        1
    } else {
        ct.div_ceil(sealed_size)
    };
    ct.saturating_sub(chunk_count * TAG_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plock_crypto::FORMAT_VERSION;

    fn current_payload(plaintext_len: usize, chunk_size: usize, with_salt: bool) -> Vec<u8> {
        let chunk_count = if plaintext_len <= chunk_size {
            1
        } else {
            plaintext_len.div_ceil(chunk_size)
        };
        let salt_len = if with_salt { SALT_SIZE } else { 0 };
        let mut payload =
            vec![0u8; 1 + NONCE_SIZE + salt_len + plaintext_len + chunk_count * TAG_SIZE];
        payload[0] = FORMAT_VERSION;
        payload
    }

    #[test]
    fn test_plaintext_len_estimate_is_exact() {
        for chunk_size in [64usize, 1000, 1_048_576] {
            for plaintext_len in [0usize, 1, 63, 64, 65, 999, 1000, 1001, 5000] {
                let payload = current_payload(plaintext_len, chunk_size, true);
                assert_eq!(
                    plaintext_len_estimate(&payload, true, chunk_size),
                    plaintext_len,
                    "plaintext_len={plaintext_len} chunk_size={chunk_size}"
                );
            }
        }
    }

    #[test]
    fn test_plaintext_len_estimate_without_salt() {
        let payload = current_payload(300, 64, false);
        assert_eq!(plaintext_len_estimate(&payload, false, 64), 300);
    }

    #[test]
    fn test_plaintext_len_estimate_legacy() {
        // no version byte, so the first-byte probe routes to the legacy shape
        let payload = vec![0x42u8; SALT_SIZE + LEGACY_NONCE_SIZE + 500 + TAG_SIZE];
        assert_eq!(plaintext_len_estimate(&payload, true, 1024), 500);
    }
}
