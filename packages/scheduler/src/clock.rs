//! Time sources for the scheduler.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// The instant this clock started at.
    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = match self.elapsed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *elapsed += by;
    }

    /// Move the clock to `start + at`. Never moves backwards.
    pub fn set_elapsed(&self, at: Duration) {
        let mut elapsed = match self.elapsed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *elapsed = (*elapsed).max(at);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = match self.elapsed.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        self.start + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_forward_only() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.start());

        clock.advance(Duration::from_millis(30));
        assert_eq!(clock.now(), clock.start() + Duration::from_millis(30));

        clock.set_elapsed(Duration::from_millis(10));
        assert_eq!(clock.now(), clock.start() + Duration::from_millis(30));

        clock.set_elapsed(Duration::from_millis(100));
        assert_eq!(clock.now(), clock.start() + Duration::from_millis(100));
    }
}
