//! Data datagram payload
//!
//! Every data datagram carries the sender's wall-clock send time and a
//! packet counter right after the header. The counter is 32 or 64 bits wide
//! depending on a per-stream setting that both ends must agree on.

use crate::cursor::{CursorError, ReadCursor, WriteCursor};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock time as carried on the wire (seconds + microseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct WallTime {
    pub secs: u32,
    pub usecs: u32,
}

impl WallTime {
    pub fn new(secs: u32, usecs: u32) -> Self {
        WallTime { secs, usecs }
    }

    /// Convert a system time, truncating seconds to 32 bits
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        WallTime {
            secs: since_epoch.as_secs() as u32,
            usecs: since_epoch.subsec_micros(),
        }
    }

    /// Value in (fractional) seconds
    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.usecs as f64 / 1_000_000.0
    }

    /// Signed difference `self - earlier` in seconds
    ///
    /// Negative when the two clocks disagree; callers that only compare
    /// successive differences do not care.
    pub fn secs_since(&self, earlier: WallTime) -> f64 {
        let micros = (self.secs as i64 - earlier.secs as i64) * 1_000_000
            + (self.usecs as i64 - earlier.usecs as i64);
        micros as f64 / 1_000_000.0
    }
}

/// Width of the packet counter in data datagrams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterWidth {
    /// 4-byte counter
    #[default]
    Bits32,
    /// 8-byte counter
    Bits64,
}

impl CounterWidth {
    pub fn from_flag(counters_64bit: bool) -> Self {
        if counters_64bit {
            CounterWidth::Bits64
        } else {
            CounterWidth::Bits32
        }
    }

    /// Counter length in bytes
    pub fn byte_len(self) -> usize {
        match self {
            CounterWidth::Bits32 => 4,
            CounterWidth::Bits64 => 8,
        }
    }
}

/// Timestamp and counter following the header of a data datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPayload {
    /// Sender's clock when the datagram was built
    pub sent_at: WallTime,
    /// Sender's packet counter (first packet is 1)
    pub packet_count: u64,
}

impl DataPayload {
    pub fn new(sent_at: WallTime, packet_count: u64) -> Self {
        DataPayload {
            sent_at,
            packet_count,
        }
    }

    /// Encoded length for the given counter width
    pub fn encoded_len(width: CounterWidth) -> usize {
        8 + width.byte_len()
    }

    /// Write the payload at the start of `buf`
    ///
    /// In 32-bit mode the counter is truncated to its low 32 bits.
    pub fn encode(&self, buf: &mut [u8], width: CounterWidth) -> Result<usize, CursorError> {
        let mut cur = WriteCursor::new(buf);
        cur.write_u32(self.sent_at.secs)?;
        cur.write_u32(self.sent_at.usecs)?;
        match width {
            CounterWidth::Bits64 => cur.write_u64(self.packet_count)?,
            CounterWidth::Bits32 => cur.write_u32(self.packet_count as u32)?,
        }
        Ok(cur.position())
    }

    /// Read the payload from the start of `buf`
    pub fn decode(buf: &[u8], width: CounterWidth) -> Result<Self, CursorError> {
        let mut cur = ReadCursor::new(buf);
        let secs = cur.read_u32()?;
        let usecs = cur.read_u32()?;
        let packet_count = match width {
            CounterWidth::Bits64 => cur.read_u64()?,
            CounterWidth::Bits32 => cur.read_u32()? as u64,
        };
        Ok(DataPayload {
            sent_at: WallTime::new(secs, usecs),
            packet_count,
        })
    }
}
