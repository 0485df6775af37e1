use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use uaserver_scheduler::{
    Clock, Dispatcher, Job, ManualClock, Scheduler, SchedulerConfig, SchedulerError,
};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn manual<C>() -> (Scheduler<C>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (
        Scheduler::with_clock(SchedulerConfig::default(), clock.clone()),
        clock,
    )
}

/// One loop iteration without network layers.
fn iterate<C: Send + Sync + 'static>(
    scheduler: &Scheduler<C>,
    dispatcher: &Dispatcher<C>,
    ctx: &Arc<C>,
) -> usize {
    scheduler.reap().unwrap();
    let due = scheduler.collect_due().unwrap();
    dispatcher.dispatch(ctx, due)
}

#[test]
fn repeated_job_fires_on_schedule_and_stops_after_removal() {
    let (scheduler, clock) = manual::<()>();
    let fired = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&fired);
    let id = scheduler
        .add_repeated_job(
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            ms(100),
        )
        .unwrap();
    let dispatcher = Dispatcher::Inline;
    let ctx = Arc::new(());

    // Nothing before the first interval has passed.
    for t in [0, 10, 50, 99] {
        clock.set_elapsed(ms(t));
        iterate(&scheduler, &dispatcher, &ctx);
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    clock.set_elapsed(ms(120));
    iterate(&scheduler, &dispatcher, &ctx);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    clock.set_elapsed(ms(150));
    scheduler.remove_repeated_job(id).unwrap();
    assert!(!scheduler.is_live(id).unwrap());

    iterate(&scheduler, &dispatcher, &ctx);
    assert!(!scheduler.live_jobs().unwrap().contains(&id));
    assert!(!scheduler.is_pending_cancellation(id).unwrap());

    for t in [200, 300, 1_000] {
        clock.set_elapsed(ms(t));
        iterate(&scheduler, &dispatcher, &ctx);
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn due_times_do_not_drift_with_loop_latency() {
    let (scheduler, clock) = manual::<()>();
    let id = scheduler.add_repeated_job(|_| Ok(()), ms(100)).unwrap();
    let start = clock.start();

    // The loop wakes 30ms late every time.
    for k in 1..=10u32 {
        clock.set_elapsed(ms(100) * k + ms(30));
        let fired = scheduler.collect_due().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(
            scheduler.next_due(id).unwrap(),
            Some(start + ms(100) * (k + 1))
        );
    }
}

#[test]
fn late_loop_catches_up_one_firing_per_iteration() {
    let (scheduler, clock) = manual::<()>();
    let id = scheduler.add_repeated_job(|_| Ok(()), ms(10)).unwrap();

    clock.set_elapsed(ms(35));
    let mut firings = 0;
    loop {
        let fired = scheduler.collect_due().unwrap();
        if fired.is_empty() {
            break;
        }
        firings += fired.len();
    }
    assert_eq!(firings, 3);
    assert_eq!(scheduler.next_due(id).unwrap(), Some(clock.start() + ms(40)));
}

#[test]
fn jobs_fire_in_due_time_order() {
    let (scheduler, clock) = manual::<Mutex<Vec<&'static str>>>();
    scheduler
        .add_repeated_job(|log: &Mutex<Vec<&'static str>>| {
            log.lock().unwrap().push("slow");
            Ok(())
        }, ms(30))
        .unwrap();
    scheduler
        .add_repeated_job(|log: &Mutex<Vec<&'static str>>| {
            log.lock().unwrap().push("fast");
            Ok(())
        }, ms(20))
        .unwrap();

    clock.set_elapsed(ms(30));
    let ctx = Arc::new(Mutex::new(Vec::new()));
    let due: Vec<Job<_>> = scheduler.collect_due().unwrap();
    Dispatcher::Inline.dispatch(&ctx, due);
    assert_eq!(*ctx.lock().unwrap(), vec!["fast", "slow"]);
}

#[test]
fn cancellation_waits_for_a_running_firing() {
    let (scheduler, clock) = manual::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let started_tx = Mutex::new(started_tx);
    let release_rx = Mutex::new(release_rx);
    let runs = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&runs);

    let id = scheduler
        .add_repeated_job(
            move |_| {
                started_tx.lock().unwrap().send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            ms(10),
        )
        .unwrap();

    let dispatcher = Dispatcher::new(2).unwrap();
    let ctx = Arc::new(());
    clock.set_elapsed(ms(10));
    assert_eq!(iterate(&scheduler, &dispatcher, &ctx), 1);
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // The firing is executing on a worker right now.
    scheduler.remove_repeated_job(id).unwrap();
    clock.set_elapsed(ms(20));
    assert_eq!(iterate(&scheduler, &dispatcher, &ctx), 0);
    assert!(scheduler.is_pending_cancellation(id).unwrap());
    assert_eq!(scheduler.next_due(id).unwrap(), Some(clock.start() + ms(20)));

    release_tx.send(()).unwrap();
    let mut reaped = false;
    for _ in 0..500 {
        scheduler.reap().unwrap();
        if !scheduler.is_pending_cancellation(id).unwrap() {
            reaped = true;
            break;
        }
        thread::sleep(ms(5));
    }
    assert!(reaped);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.next_due(id).unwrap(), None);
    dispatcher.shutdown();
}

#[test]
fn jobs_can_manage_repeated_jobs_from_a_worker() {
    let (scheduler, clock) = manual::<()>();
    let scheduler = Arc::new(scheduler);
    let target = scheduler.add_repeated_job(|_| Ok(()), ms(50)).unwrap();
    let outer = Scheduler::<Arc<Scheduler<()>>>::with_clock(
        SchedulerConfig::default(),
        clock.clone(),
    );
    outer
        .add_repeated_job(
            move |inner: &Arc<Scheduler<()>>| {
                inner.remove_repeated_job(target)?;
                Ok(())
            },
            ms(10),
        )
        .unwrap();

    let dispatcher = Dispatcher::new(1).unwrap();
    clock.set_elapsed(ms(10));
    iterate(&outer, &dispatcher, &Arc::new(Arc::clone(&scheduler)));
    dispatcher.shutdown();

    assert!(scheduler.is_pending_cancellation(target).unwrap());
    assert_eq!(scheduler.reap().unwrap(), 1);
}

#[test]
fn intervals_past_the_clock_range_are_rejected() {
    let (scheduler, _clock) = manual::<()>();
    assert_eq!(
        scheduler.add_repeated_job(|_| Ok(()), Duration::MAX),
        Err(SchedulerError::IntervalTooLarge {
            interval: Duration::MAX
        })
    );
    assert!(scheduler.live_jobs().unwrap().is_empty());
}

#[test]
fn job_is_parked_when_its_next_due_time_overflows() {
    let (scheduler, clock) = manual::<()>();
    let start = clock.start();

    // Largest whole-second offset from `start` the clock can represent.
    let (mut lo, mut hi) = (0u64, u64::MAX);
    while lo < hi {
        let mid = lo + (hi - lo) / 2 + 1;
        if start.checked_add(Duration::from_secs(mid)).is_some() {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    let interval = Duration::from_secs(lo);
    let id = scheduler.add_repeated_job(|_| Ok(()), interval).unwrap();
    assert_eq!(scheduler.next_due(id).unwrap(), Some(start + interval));

    clock.set_elapsed(interval);
    assert_eq!(scheduler.collect_due().unwrap().len(), 1);
    assert_eq!(scheduler.next_due(id).unwrap(), None);
    assert!(scheduler.collect_due().unwrap().is_empty());
    assert_eq!(scheduler.next_timeout().unwrap(), ms(50));

    assert!(scheduler.is_live(id).unwrap());
    scheduler.remove_repeated_job(id).unwrap();
    assert_eq!(scheduler.reap().unwrap(), 1);
}

proptest! {
    /// However irregularly the loop wakes up, every due time stays on the
    /// grid `start + k * interval` and lies in the future after a collect.
    #[test]
    fn due_times_stay_on_the_grid(
        interval in 5u64..200,
        steps in prop::collection::vec(0u64..500, 1..40),
    ) {
        let (scheduler, clock) = manual::<()>();
        let id = scheduler.add_repeated_job(|_| Ok(()), ms(interval)).unwrap();
        let mut firings = 0u64;

        for step in steps {
            clock.advance(ms(step));
            loop {
                let fired = scheduler.collect_due().unwrap().len() as u64;
                if fired == 0 {
                    break;
                }
                firings += fired;
            }
            let due = scheduler.next_due(id).unwrap().unwrap();
            let offset = due.duration_since(clock.start());
            prop_assert_eq!(offset.as_millis() as u64 % interval, 0);
            prop_assert!(due > clock.now());
            prop_assert_eq!(offset, ms(interval) * (firings as u32 + 1));
        }
    }
}
