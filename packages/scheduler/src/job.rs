//! Jobs: the units of work the main loop dispatches.
//!
//! Every job runs against a shared context `C` (the server passes its own
//! context). A [`NetworkJob`] is produced by a network layer and runs once.
//! A repeated job is registered with the [`Scheduler`](crate::Scheduler) and
//! handed out as a [`Job::Repeated`] each time it falls due.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

/// Identifier of a repeated job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The work of a repeated job, shared by all of its firings.
pub type Payload<C> = Arc<dyn Fn(&C) -> anyhow::Result<()> + Send + Sync>;

/// A one-shot unit of work from a network layer.
pub struct NetworkJob<C> {
    work: Box<dyn FnOnce(&C) -> anyhow::Result<()> + Send>,
}

impl<C> NetworkJob<C> {
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce(&C) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            work: Box::new(work),
        }
    }
}

/// Counts executions of one repeated job that have been handed out but have
/// not finished yet.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    pub(crate) fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(Arc::clone(&self.0))
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.0.load(Ordering::Acquire) == 0
    }
}

/// Held by a fired job until it has run (or been dropped unrun).
#[derive(Debug)]
pub(crate) struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One firing of a repeated job.
pub struct FiredJob<C> {
    pub(crate) id: JobId,
    pub(crate) payload: Payload<C>,
    pub(crate) _guard: InFlightGuard,
}

impl<C> FiredJob<C> {
    pub fn id(&self) -> JobId {
        self.id
    }
}

/// A job ready for dispatch.
pub enum Job<C> {
    Network(NetworkJob<C>),
    Repeated(FiredJob<C>),
}

impl<C> Job<C> {
    /// Run the job to completion, consuming it.
    pub fn run(self, ctx: &C) -> anyhow::Result<()> {
        match self {
            Job::Network(job) => (job.work)(ctx),
            Job::Repeated(job) => (job.payload)(ctx),
        }
    }

    /// Short description for log output.
    pub fn label(&self) -> String {
        match self {
            Job::Network(_) => "network".to_string(),
            Job::Repeated(job) => format!("repeated {}", job.id),
        }
    }
}

impl<C> From<NetworkJob<C>> for Job<C> {
    fn from(job: NetworkJob<C>) -> Self {
        Job::Network(job)
    }
}

impl<C> fmt::Debug for Job<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", self.label())
    }
}
