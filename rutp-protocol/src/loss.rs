//! Constant-memory loss and reordering estimation
//!
//! The receiver remembers only the highest packet counter it has seen.
//! A forward gap is presumed lost; a later arrival of any counter at or
//! below that mark is counted as out of order and takes back one presumed
//! loss. Duplicated datagrams are therefore misread as recoveries. The
//! estimate is kept that way so results stay comparable with other
//! implementations of the same probe.

/// What a single arrival did to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    /// The expected next counter
    InOrder,
    /// Counter jumped forward; `missing` packets presumed lost
    Gap { missing: u64 },
    /// Counter did not exceed the highest seen
    OutOfOrder { expected: u64 },
}

/// Approximate loss / out-of-order tracker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    /// Highest counter seen so far
    highest_seen: u64,
    /// Estimated lost packets (never negative)
    lost: u64,
    /// Packets that arrived at or below the highest counter
    out_of_order: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one received counter
    pub fn record(&mut self, received: u64) -> SequenceEvent {
        if received > self.highest_seen {
            let missing = received - 1 - self.highest_seen;
            self.lost += missing;
            self.highest_seen = received;
            if missing > 0 {
                SequenceEvent::Gap { missing }
            } else {
                SequenceEvent::InOrder
            }
        } else {
            self.out_of_order += 1;
            self.lost = self.lost.saturating_sub(1);
            SequenceEvent::OutOfOrder {
                expected: self.highest_seen.saturating_add(1),
            }
        }
    }

    pub fn highest_seen(&self) -> u64 {
        self.highest_seen
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }

    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    /// Loss as a percentage of the packets the sender has numbered so far
    pub fn loss_percent(&self) -> f64 {
        if self.highest_seen == 0 {
            0.0
        } else {
            self.lost as f64 * 100.0 / self.highest_seen as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(seq: &[u64]) -> SequenceTracker {
        let mut tracker = SequenceTracker::new();
        for &s in seq {
            tracker.record(s);
        }
        tracker
    }

    #[test]
    fn test_in_order() {
        let tracker = feed(&[1, 2, 3, 4]);
        assert_eq!(tracker.lost(), 0);
        assert_eq!(tracker.out_of_order(), 0);
        assert_eq!(tracker.highest_seen(), 4);
    }

    #[test]
    fn test_gap_then_late_arrivals() {
        let mut tracker = feed(&[1, 2]);

        assert_eq!(tracker.record(5), SequenceEvent::Gap { missing: 2 });
        assert_eq!(tracker.lost(), 2);
        assert_eq!(tracker.highest_seen(), 5);

        assert_eq!(tracker.record(3), SequenceEvent::OutOfOrder { expected: 6 });
        assert_eq!(tracker.out_of_order(), 1);
        assert_eq!(tracker.lost(), 1);

        tracker.record(4);
        assert_eq!(tracker.out_of_order(), 2);
        assert_eq!(tracker.lost(), 0);
        assert_eq!(tracker.highest_seen(), 5);
    }

    #[test]
    fn test_loss_never_negative() {
        // The late arrival cancels the gap it opened
        let tracker = feed(&[2, 1]);
        assert_eq!(tracker.lost(), 0);
        assert_eq!(tracker.out_of_order(), 1);

        let tracker = feed(&[1, 1, 1]);
        assert_eq!(tracker.lost(), 0);
        assert_eq!(tracker.out_of_order(), 2);
    }

    #[test]
    fn test_duplicate_offsets_loss() {
        // A duplicate after a gap is misread as a recovery
        let tracker = feed(&[1, 4, 4]);
        assert_eq!(tracker.lost(), 1);
        assert_eq!(tracker.out_of_order(), 1);
    }

    #[test]
    fn test_first_packet_not_one() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.record(10), SequenceEvent::Gap { missing: 9 });
        assert_eq!(tracker.lost(), 9);
    }

    #[test]
    fn test_counter_zero_is_out_of_order() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.record(0), SequenceEvent::OutOfOrder { expected: 1 });
        assert_eq!(tracker.highest_seen(), 0);
    }

    #[test]
    fn test_repeat_of_max_counter_is_out_of_order() {
        let mut tracker = SequenceTracker::new();
        tracker.record(u64::MAX - 1);
        assert_eq!(tracker.record(u64::MAX), SequenceEvent::InOrder);
        assert_eq!(
            tracker.record(u64::MAX),
            SequenceEvent::OutOfOrder { expected: u64::MAX }
        );
        assert_eq!(tracker.out_of_order(), 1);
        assert_eq!(tracker.highest_seen(), u64::MAX);
    }

    #[test]
    fn test_loss_percent() {
        let tracker = feed(&[1, 2, 5, 6, 7, 8, 9, 10]);
        assert!((tracker.loss_percent() - 20.0).abs() < 1e-9);
        assert_eq!(SequenceTracker::new().loss_percent(), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn prop_every_arrival_is_classified(counts in proptest::collection::vec(0u64..1000, 0..200)) {
            let mut tracker = SequenceTracker::new();
            let mut advanced = 0u64;
            for &count in &counts {
                if !matches!(tracker.record(count), SequenceEvent::OutOfOrder { .. }) {
                    advanced += 1;
                }
            }
            proptest::prop_assert_eq!(advanced + tracker.out_of_order(), counts.len() as u64);
            proptest::prop_assert_eq!(tracker.highest_seen(), counts.iter().copied().max().unwrap_or(0));
            proptest::prop_assert!(tracker.lost() <= tracker.highest_seen());
        }
    }
}
