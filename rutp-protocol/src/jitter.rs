//! Inter-arrival jitter estimation (RFC 1889, section A.8)
//!
//! Transit time is the receiver's arrival clock minus the sender's embedded
//! send clock. The two clocks need not be synchronized: only the change in
//! transit between consecutive packets feeds the estimate, so any constant
//! offset cancels out.

/// Whether the stream has produced its first decoded packet yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    /// No packet decoded; the next transit sample only initializes
    #[default]
    Fresh,
    /// At least one packet decoded
    Established,
}

/// Smoothed jitter estimate, in seconds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JitterEstimator {
    phase: StreamPhase,
    jitter: f64,
    prev_transit: f64,
}

impl JitterEstimator {
    /// Gain of the exponential moving average
    pub const GAIN: f64 = 1.0 / 16.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transit time sample (seconds, may be negative)
    pub fn record(&mut self, transit: f64) {
        match self.phase {
            StreamPhase::Fresh => {
                self.phase = StreamPhase::Established;
            }
            StreamPhase::Established => {
                let d = (transit - self.prev_transit).abs();
                self.jitter += (d - self.jitter) * Self::GAIN;
            }
        }
        self.prev_transit = transit;
    }

    /// Current estimate in seconds
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Last transit sample, if any
    pub fn prev_transit(&self) -> Option<f64> {
        match self.phase {
            StreamPhase::Fresh => None,
            StreamPhase::Established => Some(self.prev_transit),
        }
    }
}
