//! Send scheduling for the client's data loop
//!
//! One block is due every `block_size * 8 / rate_bps` seconds. When the
//! sender falls more than a burst behind, the schedule restarts from now
//! rather than firing the backlog all at once.

use std::time::{Duration, Instant};

/// Blocks that may be sent back to back after a stall
const MAX_BURST_BLOCKS: u32 = 4;

/// Per-block send deadlines derived from a target bit rate
#[derive(Debug, Clone)]
pub struct SendSchedule {
    interval: Option<Duration>,
    next_due: Instant,
}

impl SendSchedule {
    /// `rate_bps` of 0 means unlimited
    pub fn new(rate_bps: u64, block_size: usize, start: Instant) -> Self {
        let interval = (rate_bps > 0).then(|| {
            let nanos = block_size as u128 * 8 * 1_000_000_000 / rate_bps as u128;
            Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
        });
        SendSchedule {
            interval,
            next_due: start,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// How long to wait before the next block is due
    pub fn delay(&self, now: Instant) -> Duration {
        match self.interval {
            Some(_) => self.next_due.saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Record that a block went out at `now`
    pub fn mark_sent(&mut self, now: Instant) {
        let Some(interval) = self.interval else {
            return;
        };
        self.next_due += interval;

        let backlog = interval * MAX_BURST_BLOCKS;
        if now.saturating_duration_since(self.next_due) > backlog {
            self.next_due = now;
        }
    }
}
