//! Bounded execution of a stage on a worker thread.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::error::{Stage, TimeoutError};

/// Why a bounded call produced no value.
#[derive(Debug)]
pub enum WorkerError {
    /// The limit elapsed first. The worker is abandoned, not killed.
    Timeout(TimeoutError),
    /// The worker ended without sending a value (it panicked or could not
    /// be spawned).
    Disconnected,
}

/// Runs `work`, bounded by `limit` when one is given.
///
/// Without a limit the closure runs on the calling thread. With a limit it
/// runs on a named worker thread and the result is received through a
/// one-slot channel.
///
/// # Errors
///
/// Returns [`WorkerError::Timeout`] when `limit` elapses first and
/// [`WorkerError::Disconnected`] when the worker dies without a result.
pub fn run_bounded<T, F>(stage: Stage, limit: Option<Duration>, work: F) -> Result<T, WorkerError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let Some(limit) = limit else {
        return Ok(work());
    };

    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name(format!("brepgraph-{stage}"))
        .spawn(move || {
            // The receiver may be gone after a timeout.
            let _ = tx.send(work());
        })
        .map_err(|_| WorkerError::Disconnected)?;

    match rx.recv_timeout(limit) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => Err(WorkerError::Timeout(TimeoutError { stage, limit })),
        Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
    }
}
