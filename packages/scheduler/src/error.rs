//! Error types for the scheduler.

use std::sync::PoisonError;
use std::time::Duration;

use thiserror::Error;

use crate::JobId;

/// Errors returned by scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// No live repeated job has this id.
    #[error("unknown repeated job: {0}")]
    UnknownJob(JobId),

    /// The requested interval is below the configured minimum.
    #[error("interval {interval:?} is below the minimum of {minimum:?}")]
    IntervalTooSmall { interval: Duration, minimum: Duration },

    /// The first due time would lie past what the clock can represent.
    #[error("interval {interval:?} is too large for the clock")]
    IntervalTooLarge { interval: Duration },

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    /// A thread panicked while holding scheduler state.
    #[error("scheduler state lock poisoned")]
    LockPoisoned,
}

impl<T> From<PoisonError<T>> for SchedulerError {
    fn from(_: PoisonError<T>) -> Self {
        SchedulerError::LockPoisoned
    }
}
