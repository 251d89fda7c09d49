//! Time source for the poller.
//!
//! The poller only ever asks for "now" and "sleep for this long", and the
//! cloud source asks for the calendar time its lookback window ends at, so all
//! of it is behind [`Clock`]. Production code uses [`TokioClock`]; tests use
//! [`ManualClock`] to run whole attempts in virtual time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::UtcDateTime;

pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Calendar time, for windows expressed to external services.
    fn wall_now(&self) -> UtcDateTime;

    fn sleep<'a>(&'a self, duration: Duration) -> SleepFuture<'a>;
}

/// Wall-clock time backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> UtcDateTime {
        UtcDateTime::now()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> SleepFuture<'a> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Virtual clock: `sleep` advances time and completes on first poll.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: UtcDateTime,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(UtcDateTime::now())
    }

    /// Virtual clock whose calendar time starts at `wall_origin`.
    pub fn starting_at(wall_origin: UtcDateTime) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut offset = match self.offset.lock() {
            Ok(offset) => offset,
            Err(poisoned) => poisoned.into_inner(),
        };
        *offset = offset.saturating_add(duration);
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        match self.offset.lock() {
            Ok(offset) => *offset,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn wall_now(&self) -> UtcDateTime {
        self.wall_origin.plus(self.elapsed())
    }

    fn sleep<'a>(&'a self, duration: Duration) -> SleepFuture<'a> {
        Box::pin(async move {
            self.advance(duration);
        })
    }
}
