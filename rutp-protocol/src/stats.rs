//! Per-stream measurement state
//!
//! One [`StreamState`] exists per established stream. It is owned by the
//! stream and mutated only through `&mut self`, so it is never shared.

use crate::jitter::{JitterEstimator, StreamPhase};
use crate::loss::{SequenceEvent, SequenceTracker};
use crate::payload::{DataPayload, WallTime};

/// Lifetime and per-interval byte totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCounters {
    pub sent: u64,
    pub sent_this_interval: u64,
    pub received: u64,
    pub received_this_interval: u64,
}

impl ByteCounters {
    pub fn add_sent(&mut self, n: usize) {
        self.sent += n as u64;
        self.sent_this_interval += n as u64;
    }

    pub fn add_received(&mut self, n: usize) {
        self.received += n as u64;
        self.received_this_interval += n as u64;
    }

    pub fn reset_interval(&mut self) {
        self.sent_this_interval = 0;
        self.received_this_interval = 0;
    }
}

/// Measurement state of one stream
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Local send counter; the first datagram sent is numbered 1
    packets_sent: u64,
    sequence: SequenceTracker,
    jitter: JitterEstimator,
    bytes: ByteCounters,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the send counter and return the number for the next datagram
    pub fn next_packet_number(&mut self) -> u64 {
        self.packets_sent += 1;
        self.packets_sent
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn bytes(&self) -> &ByteCounters {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut ByteCounters {
        &mut self.bytes
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn jitter(&self) -> &JitterEstimator {
        &self.jitter
    }

    pub fn phase(&self) -> StreamPhase {
        self.jitter.phase()
    }

    /// Account for one decoded data payload that arrived at `arrival`
    pub fn record_arrival(&mut self, payload: &DataPayload, arrival: WallTime) -> SequenceEvent {
        let event = self.sequence.record(payload.packet_count);
        self.jitter.record(arrival.secs_since(payload.sent_at));
        event
    }

    /// Snapshot for reporting
    pub fn report(&self) -> StreamReport {
        StreamReport {
            packets_sent: self.packets_sent,
            highest_seen: self.sequence.highest_seen(),
            lost: self.sequence.lost(),
            out_of_order: self.sequence.out_of_order(),
            loss_percent: self.sequence.loss_percent(),
            jitter_ms: self.jitter.jitter() * 1000.0,
            bytes: self.bytes,
        }
    }
}

/// Point-in-time view of a stream's measurements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamReport {
    /// Datagrams sent by this end
    pub packets_sent: u64,
    /// Highest counter received from the peer
    pub highest_seen: u64,
    /// Estimated lost datagrams
    pub lost: u64,
    /// Datagrams received out of order
    pub out_of_order: u64,
    /// Loss relative to the highest counter seen
    pub loss_percent: f64,
    /// Jitter in milliseconds
    pub jitter_ms: f64,
    /// Byte totals
    pub bytes: ByteCounters,
}
