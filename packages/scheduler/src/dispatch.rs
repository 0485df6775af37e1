//! Running jobs: inline on the loop thread or on a fixed worker pool.
//!
//! A job that returns an error or panics is logged and dropped; it never
//! takes the loop or a worker down with it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, error, warn};

use crate::{Job, SchedulerError};

/// Run one job, isolating its failure.
pub fn run_isolated<C>(job: Job<C>, ctx: &C) {
    let label = job.label();
    match catch_unwind(AssertUnwindSafe(|| job.run(ctx))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(job = %label, error = %e, "job failed"),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(job = %label, panic = %message, "job panicked");
        }
    }
}

type Task<C> = (Job<C>, Arc<C>);

/// A fixed set of threads pulling jobs from a shared queue.
///
/// Jobs may run in any order and complete in any order.
pub struct WorkerPool<C: Send + Sync + 'static> {
    sender: Option<Sender<Task<C>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<C: Send + Sync + 'static> WorkerPool<C> {
    pub fn new(size: usize) -> Result<Self, SchedulerError> {
        let (sender, receiver) = unbounded::<Task<C>>();
        let mut workers = Vec::with_capacity(size);
        for n in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("uaserver-worker-{}", n))
                .spawn(move || {
                    for (job, ctx) in receiver.iter() {
                        run_isolated(job, &*ctx);
                    }
                    debug!(worker = n, "worker stopped");
                })
                .map_err(|e| SchedulerError::Spawn(e.to_string()))?;
            workers.push(handle);
        }
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    fn submit(&self, job: Job<C>, ctx: Arc<C>) {
        let Some(sender) = &self.sender else {
            run_isolated(job, &*ctx);
            return;
        };
        if let Err(returned) = sender.send((job, ctx)) {
            let (job, ctx) = returned.into_inner();
            warn!(job = %job.label(), "worker queue closed, running inline");
            run_isolated(job, &*ctx);
        }
    }

    /// Close the queue and wait for the workers to finish what was queued.
    fn join(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

impl<C: Send + Sync + 'static> Drop for WorkerPool<C> {
    fn drop(&mut self) {
        self.join();
    }
}

/// Where dispatched jobs run.
pub enum Dispatcher<C: Send + Sync + 'static> {
    /// Sequentially on the calling thread, in the order given.
    Inline,
    Pool(WorkerPool<C>),
}

impl<C: Send + Sync + 'static> Dispatcher<C> {
    /// Inline for zero workers, a pool otherwise.
    pub fn new(workers: usize) -> Result<Self, SchedulerError> {
        if workers == 0 {
            Ok(Dispatcher::Inline)
        } else {
            Ok(Dispatcher::Pool(WorkerPool::new(workers)?))
        }
    }

    pub fn dispatch(&self, ctx: &Arc<C>, jobs: Vec<Job<C>>) -> usize {
        let count = jobs.len();
        match self {
            Dispatcher::Inline => {
                for job in jobs {
                    run_isolated(job, &**ctx);
                }
            }
            Dispatcher::Pool(pool) => {
                for job in jobs {
                    pool.submit(job, Arc::clone(ctx));
                }
            }
        }
        count
    }

    /// Wait for every queued job to finish and stop the workers.
    pub fn shutdown(self) {
        if let Dispatcher::Pool(mut pool) = self {
            pool.join();
        }
    }
}

impl<C: Send + Sync + 'static> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatcher::Inline => write!(f, "Inline"),
            Dispatcher::Pool(pool) => write!(f, "Pool({})", pool.size()),
        }
    }
}
