//! Clocks
//!
//! Data datagrams are stamped with wall-clock time, so the clock here is a
//! wall clock rather than a monotonic one.

use rutp_protocol::WallTime;
use std::cell::Cell;
use std::time::{Duration, SystemTime};

/// Source of wall-clock time for stamping and arrival measurement
pub trait Clock {
    fn now(&self) -> WallTime;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> WallTime {
        WallTime::from_system_time(SystemTime::now())
    }
}

/// Manually driven clock for deterministic tests and simulations
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Cell<WallTime>,
}

impl ManualClock {
    pub fn new(start: WallTime) -> Self {
        ManualClock {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, time: WallTime) {
        self.now.set(time);
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let now = self.now.get();
        let total_us = now.usecs as u64 + by.subsec_micros() as u64;
        self.now.set(WallTime {
            secs: now
                .secs
                .wrapping_add(by.as_secs() as u32)
                .wrapping_add((total_us / 1_000_000) as u32),
            usecs: (total_us % 1_000_000) as u32,
        });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> WallTime {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> WallTime {
        (**self).now()
    }
}
