use serde::{Deserialize, Serialize};

/// Top-level engine configuration (parseable from TOML, all fields default)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub crypto: CryptoConfig,
    pub kdf: KdfConfig,
    pub worker: WorkerConfig,
}

/// Chunked AEAD parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Plaintext chunk size in bytes (default: 1 MiB)
    pub chunk_size: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_048_576,
        }
    }
}

/// Password-hardening parameters.
///
/// Large payloads get a reduced iteration count: the same derivation runs
/// again on decrypt, and for multi-megabyte content the chunked encryption
/// already dominates latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// PBKDF2 iterations for payloads at or below the threshold (default: 300_000)
    pub iterations_normal: u32,
    /// PBKDF2 iterations for payloads above the threshold (default: 100_000)
    pub iterations_large: u32,
    /// Payload size above which the reduced iteration count applies (default: 1 MiB)
    pub large_payload_threshold: usize,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            iterations_normal: 300_000,
            iterations_large: 100_000,
            large_payload_threshold: 1_048_576,
        }
    }
}

/// Background worker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Route operations to the background worker when possible (default: true)
    pub enabled: bool,
    /// Tear the worker down after this many seconds without a job (default: 60)
    pub idle_timeout_secs: u64,
    /// Keyless payloads at or below this size run on the caller's thread (default: 4096)
    pub direct_threshold: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_timeout_secs: 60,
            direct_threshold: 4096,
        }
    }
}
