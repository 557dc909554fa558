use thiserror::Error;

pub type PlockResult<T> = Result<T, PlockError>;

/// Error taxonomy for the encryption engine.
///
/// `DecryptionFailed` is deliberately generic: it never reveals whether a
/// structural check, a chunk authentication, or the final text decode was
/// the thing that failed.
#[derive(Debug, Error)]
pub enum PlockError {
    #[error("malformed encoding: input is not valid base64")]
    MalformedEncoding,

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("unsupported envelope version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("truncated envelope: {len} bytes, need at least {min}")]
    TruncatedEnvelope { len: usize, min: usize },

    #[error("decryption failed: invalid key or corrupted data")]
    DecryptionFailed,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Internal to the dispatcher: the background worker could not take the
    /// job. Always recovered by the synchronous fallback, never surfaced.
    #[error("background worker unavailable")]
    WorkerUnavailable,
}
