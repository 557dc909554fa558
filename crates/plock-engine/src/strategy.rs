//! Execution strategy selection.
//!
//! One pure decision per call, dispatched with a match: no runtime
//! capability probing inside the operation paths.

use plock_core::config::WorkerConfig;

/// Where an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    /// Queue the job on the shared background worker thread.
    Worker,
    /// Run on the caller's thread within the call.
    Direct,
}

/// Picks the execution strategy for one operation.
///
/// Key derivation is expensive regardless of payload size, so any operation
/// that includes it goes to the worker. Keyless operations on tiny payloads
/// skip the queue hop.
pub(crate) fn choose_strategy(
    payload_len: usize,
    needs_kdf: bool,
    worker: &WorkerConfig,
) -> Strategy {
    if !worker.enabled {
        return Strategy::Direct;
    }
    if !needs_kdf && payload_len <= worker.direct_threshold {
        return Strategy::Direct;
    }
    Strategy::Worker
}
