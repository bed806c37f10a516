//! Time sources for backup timestamps and the debounce window.
//!
//! Backups are named after local time, so the clock hands out naive local
//! datetimes. The debounce window is measured on a monotonic reading instead,
//! which DST changes and wall-clock steps don't move. Tests swap in a
//! `ManualClock` to step time without sleeping.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};

pub trait Clock: Send + Sync {
    /// Current local time, at least millisecond precision.
    fn now(&self) -> NaiveDateTime;

    /// Monotonic reading for measuring intervals.
    fn monotonic(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct ManualTime {
    wall: NaiveDateTime,
    monotonic: Instant,
}

/// Clock that only moves when told to.
///
/// `advance` moves both readings. `set` only moves the wall clock, the way a
/// DST change or an NTP step would.
#[derive(Debug)]
pub struct ManualClock {
    time: Mutex<ManualTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        ManualClock {
            time: Mutex::new(ManualTime {
                wall: start,
                monotonic: Instant::now(),
            }),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        time.wall += step;
        time.monotonic += by;
    }

    pub fn set(&self, to: NaiveDateTime) {
        self.time.lock().unwrap_or_else(PoisonError::into_inner).wall = to;
    }

    fn read(&self) -> ManualTime {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.read().wall
    }

    fn monotonic(&self) -> Instant {
        self.read().monotonic
    }
}
