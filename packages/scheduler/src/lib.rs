//! uaserver scheduler: the job side of the server main loop.
//!
//! One loop iteration is:
//!
//! 1. [`Scheduler::reap`] drops cancelled repeated jobs that are not running
//! 2. [`Scheduler::next_timeout`] bounds how long network layers may block
//! 3. network layers are polled for [`NetworkJob`]s
//! 4. [`Scheduler::collect_due`] fires every repeated job that is due
//! 5. [`Dispatcher::dispatch`] runs the lot, inline or on a worker pool
//!
//! Repeated jobs are scheduled drift-free: a job with interval `I` that was
//! due at `T` is next due at `T + I`, however late the loop got to it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use uaserver_scheduler::{Dispatcher, ManualClock, Scheduler, SchedulerConfig};
//!
//! let clock = Arc::new(ManualClock::new());
//! let scheduler: Scheduler<()> = Scheduler::with_clock(SchedulerConfig::default(), clock.clone());
//! scheduler.add_repeated_job(|_| Ok(()), Duration::from_millis(100)).unwrap();
//!
//! clock.advance(Duration::from_millis(100));
//! let due = scheduler.collect_due().unwrap();
//! assert_eq!(Dispatcher::Inline.dispatch(&Arc::new(()), due), 1);
//! ```

mod clock;
mod dispatch;
mod error;
mod job;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{run_isolated, Dispatcher, WorkerPool};
pub use error::SchedulerError;
pub use job::{FiredJob, Job, JobId, NetworkJob, Payload};
pub use scheduler::{Scheduler, SchedulerConfig};
