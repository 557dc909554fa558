//! plock-core: shared types for the pastelock encryption engine.
//!
//! Holds everything the crypto and engine crates agree on: the error
//! taxonomy, the configuration schema, and the progress-reporting model.

pub mod config;
pub mod error;
pub mod progress;

pub use config::{CryptoConfig, EngineConfig, KdfConfig, WorkerConfig};
pub use error::{PlockError, PlockResult};
pub use progress::{Operation, PhaseRange, ProgressFn, ProgressReporter, ProgressUpdate};
