//! The repeated-job registry.
//!
//! Entries live in a map keyed by [`JobId`] plus a due-time index. Removal is
//! two-phase: [`Scheduler::remove_repeated_job`] only marks an entry as
//! pending cancellation, and [`Scheduler::reap`] drops it once no firing of
//! it is still executing. A pending entry never fires again.
//!
//! Lock order is `registry` before `cancelled`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::job::{FiredJob, InFlight, Payload};
use crate::{Clock, Job, JobId, SchedulerError, SystemClock};

/// Limits applied by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Repeated jobs must have at least this interval.
    pub min_interval: Duration,
    /// Upper bound on how long the loop waits for network work.
    pub max_wait: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(50),
        }
    }
}

struct Entry<C> {
    interval: Duration,
    /// `None` once the next due time is past what the clock can represent.
    next_due: Option<Instant>,
    payload: Payload<C>,
    in_flight: InFlight,
}

struct Registry<C> {
    entries: HashMap<JobId, Entry<C>>,
    due: BTreeSet<(Instant, JobId)>,
}

/// Repeated jobs of one server, ordered by due time.
pub struct Scheduler<C> {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry<C>>,
    cancelled: Mutex<HashSet<JobId>>,
}

impl<C> Scheduler<C> {
    /// A scheduler on the system clock.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            registry: Mutex::new(Registry {
                entries: HashMap::new(),
                due: BTreeSet::new(),
            }),
            cancelled: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Register `payload` to run every `interval`, first at now + interval.
    pub fn add_repeated_job<F>(&self, payload: F, interval: Duration) -> Result<JobId, SchedulerError>
    where
        F: Fn(&C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if interval < self.config.min_interval {
            return Err(SchedulerError::IntervalTooSmall {
                interval,
                minimum: self.config.min_interval,
            });
        }

        let next_due = self
            .clock
            .now()
            .checked_add(interval)
            .ok_or(SchedulerError::IntervalTooLarge { interval })?;
        let id = JobId::new();
        let mut registry = self.registry.lock()?;
        registry.entries.insert(
            id,
            Entry {
                interval,
                next_due: Some(next_due),
                payload: Arc::new(payload),
                in_flight: InFlight::default(),
            },
        );
        registry.due.insert((next_due, id));
        info!(job = %id, ?interval, "repeated job added");
        Ok(id)
    }

    /// Mark a repeated job for removal at the next [`reap`](Self::reap).
    ///
    /// A firing that is already executing runs to completion.
    pub fn remove_repeated_job(&self, id: JobId) -> Result<(), SchedulerError> {
        let registry = self.registry.lock()?;
        let mut cancelled = self.cancelled.lock()?;
        if !registry.entries.contains_key(&id) || cancelled.contains(&id) {
            return Err(SchedulerError::UnknownJob(id));
        }
        cancelled.insert(id);
        info!(job = %id, "repeated job marked for removal");
        Ok(())
    }

    /// Drop every cancelled entry that has no firing in flight.
    ///
    /// Returns the number of entries removed.
    pub fn reap(&self) -> Result<usize, SchedulerError> {
        let mut registry = self.registry.lock()?;
        let mut cancelled = self.cancelled.lock()?;
        let mut reaped = 0;
        cancelled.retain(|id| {
            let Some(entry) = registry.entries.get(id) else {
                return false;
            };
            if !entry.in_flight.is_idle() {
                return true;
            }
            if let Some(due) = entry.next_due {
                registry.due.remove(&(due, *id));
            }
            registry.entries.remove(id);
            reaped += 1;
            debug!(job = %id, "repeated job reaped");
            false
        });
        Ok(reaped)
    }

    /// How long the loop may wait before the next repeated job falls due,
    /// capped by the configured maximum wait.
    pub fn next_timeout(&self) -> Result<Duration, SchedulerError> {
        let registry = self.registry.lock()?;
        let cancelled = self.cancelled.lock()?;
        let now = self.clock.now();
        let soonest = registry
            .due
            .iter()
            .find(|(_, id)| !cancelled.contains(id))
            .map(|(due, _)| due.saturating_duration_since(now));
        Ok(match soonest {
            Some(wait) => wait.min(self.config.max_wait),
            None => self.config.max_wait,
        })
    }

    /// Hand out every live job whose due time has passed, in due-time order.
    ///
    /// Each fired entry's next due time is its previous due time plus its
    /// interval, so firings do not drift with loop latency. An entry that
    /// fell behind by several intervals fires once per call until it has
    /// caught up. An entry whose next due time would overflow the clock
    /// fires this last time and stays registered without a due time.
    pub fn collect_due(&self) -> Result<Vec<Job<C>>, SchedulerError> {
        let mut registry = self.registry.lock()?;
        let cancelled = self.cancelled.lock()?;
        let now = self.clock.now();

        let due: Vec<(Instant, JobId)> = registry
            .due
            .iter()
            .take_while(|(due, _)| *due <= now)
            .filter(|(_, id)| !cancelled.contains(id))
            .copied()
            .collect();

        let mut fired = Vec::with_capacity(due.len());
        for key in due {
            registry.due.remove(&key);
            let (previous, id) = key;
            let Some(entry) = registry.entries.get_mut(&id) else {
                continue;
            };
            entry.next_due = previous.checked_add(entry.interval);
            if entry.next_due.is_none() {
                warn!(job = %id, interval = ?entry.interval, "next due time out of range, job parked");
            }
            let next = entry.next_due.map(|due| (due, id));
            fired.push(Job::Repeated(FiredJob {
                id,
                payload: Arc::clone(&entry.payload),
                _guard: entry.in_flight.enter(),
            }));
            if let Some(next) = next {
                registry.due.insert(next);
            }
        }
        Ok(fired)
    }

    /// Ids of the jobs that are registered and not pending cancellation.
    pub fn live_jobs(&self) -> Result<Vec<JobId>, SchedulerError> {
        let registry = self.registry.lock()?;
        let cancelled = self.cancelled.lock()?;
        Ok(registry
            .entries
            .keys()
            .filter(|id| !cancelled.contains(id))
            .copied()
            .collect())
    }

    pub fn is_live(&self, id: JobId) -> Result<bool, SchedulerError> {
        let registry = self.registry.lock()?;
        let cancelled = self.cancelled.lock()?;
        Ok(registry.entries.contains_key(&id) && !cancelled.contains(&id))
    }

    /// Whether the job was removed but is still waiting to be reaped.
    pub fn is_pending_cancellation(&self, id: JobId) -> Result<bool, SchedulerError> {
        let registry = self.registry.lock()?;
        let cancelled = self.cancelled.lock()?;
        Ok(registry.entries.contains_key(&id) && cancelled.contains(&id))
    }

    /// When the job fires next; `None` for unknown or parked jobs.
    pub fn next_due(&self, id: JobId) -> Result<Option<Instant>, SchedulerError> {
        let registry = self.registry.lock()?;
        Ok(registry.entries.get(&id).and_then(|e| e.next_due))
    }

    pub fn interval(&self, id: JobId) -> Result<Option<Duration>, SchedulerError> {
        let registry = self.registry.lock()?;
        Ok(registry.entries.get(&id).map(|e| e.interval))
    }
}

impl<C> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    fn manual() -> (Scheduler<()>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (
            Scheduler::with_clock(SchedulerConfig::default(), clock.clone()),
            clock,
        )
    }

    #[test]
    fn rejects_small_intervals() {
        let (scheduler, _) = manual();
        let err = scheduler
            .add_repeated_job(|_| Ok(()), Duration::from_millis(1))
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::IntervalTooSmall {
                interval: Duration::from_millis(1),
                minimum: Duration::from_millis(5),
            }
        );
    }

    #[test]
    fn timeout_is_capped_and_tracks_soonest_job() {
        let (scheduler, clock) = manual();
        assert_eq!(scheduler.next_timeout().unwrap(), Duration::from_millis(50));

        scheduler
            .add_repeated_job(|_| Ok(()), Duration::from_millis(20))
            .unwrap();
        assert_eq!(scheduler.next_timeout().unwrap(), Duration::from_millis(20));

        clock.advance(Duration::from_millis(35));
        assert_eq!(scheduler.next_timeout().unwrap(), Duration::ZERO);
    }

    #[test]
    fn cancelled_jobs_do_not_count_for_the_timeout() {
        let (scheduler, _) = manual();
        let id = scheduler
            .add_repeated_job(|_| Ok(()), Duration::from_millis(10))
            .unwrap();
        scheduler.remove_repeated_job(id).unwrap();
        assert_eq!(scheduler.next_timeout().unwrap(), Duration::from_millis(50));
    }

    #[test]
    fn unknown_and_double_removal() {
        let (scheduler, _) = manual();
        let stranger = JobId::new();
        assert_eq!(
            scheduler.remove_repeated_job(stranger),
            Err(SchedulerError::UnknownJob(stranger))
        );

        let id = scheduler
            .add_repeated_job(|_| Ok(()), Duration::from_millis(10))
            .unwrap();
        scheduler.remove_repeated_job(id).unwrap();
        assert_eq!(
            scheduler.remove_repeated_job(id),
            Err(SchedulerError::UnknownJob(id))
        );
        assert_eq!(scheduler.reap().unwrap(), 1);
        assert_eq!(scheduler.next_due(id).unwrap(), None);
    }

    #[test]
    fn reap_waits_for_in_flight_firings() {
        let (scheduler, clock) = manual();
        let id = scheduler
            .add_repeated_job(|_| Ok(()), Duration::from_millis(10))
            .unwrap();
        clock.advance(Duration::from_millis(10));
        let mut fired = scheduler.collect_due().unwrap();
        assert_eq!(fired.len(), 1);

        scheduler.remove_repeated_job(id).unwrap();
        assert_eq!(scheduler.reap().unwrap(), 0);
        assert!(scheduler.is_pending_cancellation(id).unwrap());

        fired.pop().unwrap().run(&()).unwrap();
        assert_eq!(scheduler.reap().unwrap(), 1);
        assert!(!scheduler.is_pending_cancellation(id).unwrap());
        assert!(!scheduler.is_live(id).unwrap());
    }
}
