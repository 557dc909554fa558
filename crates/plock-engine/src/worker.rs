//! The single background worker thread.
//!
//! Created lazily on first use, reused across requests, and torn down after
//! an idle period with no pending jobs. Jobs arrive over an mpsc queue and
//! are answered over per-job oneshot channels, so concurrent requests never
//! cross-deliver results. There is no pool: one logical worker, jobs
//! processed in arrival order.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use plock_core::{PlockError, PlockResult, ProgressReporter};
use tokio::sync::oneshot;

use crate::ops::{execute, Op, OpOutput};

/// One queued operation with its reply and progress channels.
pub(crate) struct Job {
    pub(crate) op: Op,
    pub(crate) reporter: ProgressReporter,
    pub(crate) reply: oneshot::Sender<PlockResult<OpOutput>>,
}

/// Sending half of the worker queue. A dead worker (idled out or panicked)
/// shows up as a failed `submit`, which the dispatcher treats as a cue to
/// respawn or fall back.
pub(crate) struct WorkerHandle {
    tx: mpsc::Sender<Job>,
}

impl WorkerHandle {
    /// Spawns the worker thread. Spawn failure is `WorkerUnavailable`, which
    /// the dispatcher recovers from by running the job on the caller's
    /// thread.
    pub(crate) fn spawn(idle_timeout: Duration) -> PlockResult<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        std::thread::Builder::new()
            .name("plock-worker".into())
            .spawn(move || worker_loop(rx, idle_timeout))
            .map_err(|_| PlockError::WorkerUnavailable)?;
        Ok(Self { tx })
    }

    /// Queues a job, handing it back if the worker is gone.
    pub(crate) fn submit(&self, job: Job) -> Result<(), Job> {
        self.tx.send(job).map_err(|mpsc::SendError(job)| job)
    }
}

fn worker_loop(rx: mpsc::Receiver<Job>, idle_timeout: Duration) {
    tracing::debug!("background worker started");
    loop {
        match rx.recv_timeout(idle_timeout) {
            Ok(job) => {
                let correlation_id = job.reporter.correlation_id();
                let result = execute(job.op, &job.reporter);
                // The caller may have discarded its pending completion; the
                // operation still ran to completion (documented limitation:
                // no mid-chunk cancellation).
                if job.reply.send(result).is_err() {
                    tracing::debug!(%correlation_id, "caller gone, result dropped");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("worker idle, shutting down");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
