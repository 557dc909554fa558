//! Progress reporting for long-running operations.
//!
//! Operations run in phases (key derivation, chunk processing, final
//! assembly) and each phase maps its local 0..=100 progress into a fixed
//! sub-range of the overall percentage via [`PhaseRange`]. The
//! [`ProgressReporter`] clamps updates so the stream a caller observes is
//! monotonically non-decreasing and always ends at 100 on success.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Which engine operation a progress update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    DeriveKey,
    Encrypt,
    Decrypt,
}

/// A single progress notification. Ephemeral, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub operation: Operation,
    /// 0..=100, monotonically non-decreasing within one operation.
    pub percent: u8,
    /// Links the update to the originating request.
    pub correlation_id: Uuid,
}

/// Caller-supplied progress callback. Invoked from the background worker
/// thread or, on the fallback path, from the caller's thread.
pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// A sub-range of the overall percentage assigned to one phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseRange {
    start: u8,
    end: u8,
}

impl PhaseRange {
    pub const fn new(start: u8, end: u8) -> Self {
        assert!(start <= end && end <= 100);
        Self { start, end }
    }

    /// Maps a local 0..=100 percentage into this phase's global sub-range.
    pub fn map(&self, local_percent: u8) -> u8 {
        let local = local_percent.min(100) as u32;
        let span = (self.end - self.start) as u32;
        self.start + (span * local / 100) as u8
    }
}

/// Routes progress updates for one operation to the caller's callback.
///
/// Shared between the dispatcher and the worker thread; the fallback path
/// reuses the same reporter, so a retried operation can never appear to
/// move backwards.
#[derive(Clone)]
pub struct ProgressReporter {
    operation: Operation,
    correlation_id: Uuid,
    callback: Option<ProgressFn>,
    last: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub fn new(operation: Operation, correlation_id: Uuid, callback: Option<ProgressFn>) -> Self {
        Self {
            operation,
            correlation_id,
            callback,
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    /// A reporter that discards every update.
    pub fn disabled(operation: Operation) -> Self {
        Self::new(operation, Uuid::nil(), None)
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Emits a global percentage, clamped to be non-decreasing.
    pub fn emit(&self, percent: u8) {
        let percent = percent.min(100);
        let prev = self.last.fetch_max(percent, Ordering::Relaxed);
        let effective = percent.max(prev);
        if let Some(cb) = &self.callback {
            cb(ProgressUpdate {
                operation: self.operation,
                percent: effective,
                correlation_id: self.correlation_id,
            });
        }
    }

    /// Emits a phase-local percentage scaled into `phase`'s sub-range.
    pub fn emit_scaled(&self, phase: PhaseRange, local_percent: u8) {
        self.emit(phase.map(local_percent));
    }

    /// Terminal update; every successful operation ends with this.
    pub fn finish(&self) {
        self.emit(100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting_reporter(op: Operation) -> (ProgressReporter, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb: ProgressFn = Arc::new(move |u: ProgressUpdate| {
            sink.lock().unwrap().push(u.percent);
        });
        (
            ProgressReporter::new(op, Uuid::new_v4(), Some(cb)),
            seen,
        )
    }

    #[test]
    fn test_phase_range_maps_endpoints() {
        let phase = PhaseRange::new(0, 80);
        assert_eq!(phase.map(0), 0);
        assert_eq!(phase.map(50), 40);
        assert_eq!(phase.map(100), 80);

        let tail = PhaseRange::new(80, 100);
        assert_eq!(tail.map(0), 80);
        assert_eq!(tail.map(100), 100);
    }

    #[test]
    fn test_phase_range_clamps_overflow() {
        let phase = PhaseRange::new(0, 80);
        assert_eq!(phase.map(200), 80);
    }

    #[test]
    fn test_reporter_monotonic() {
        let (reporter, seen) = collecting_reporter(Operation::Encrypt);
        reporter.emit(10);
        reporter.emit(40);
        reporter.emit(20); // stale update must not regress
        reporter.finish();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![10, 40, 40, 100]);
    }

    #[test]
    fn test_reporter_clone_shares_high_water_mark() {
        let (reporter, seen) = collecting_reporter(Operation::Decrypt);
        let retry = reporter.clone();
        reporter.emit(60);
        retry.emit(30); // retried phase replays lower percentages
        retry.finish();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![60, 60, 100]);
    }

    #[test]
    fn test_disabled_reporter_is_silent() {
        let reporter = ProgressReporter::disabled(Operation::DeriveKey);
        reporter.emit(50);
        reporter.finish();
    }
}
