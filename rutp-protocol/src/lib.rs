//! RUTP Protocol Core Implementation
//!
//! This crate implements the RUTP wire format and the receiver-side
//! measurement state: header encode/decode over untrusted bytes, the data
//! payload, approximate loss/out-of-order accounting and jitter estimation.
//! It performs no I/O.

pub mod cursor;
pub mod jitter;
pub mod loss;
pub mod packet;
pub mod payload;
pub mod stats;

pub use cursor::{CursorError, ReadCursor, WriteCursor};
pub use jitter::{JitterEstimator, StreamPhase};
pub use loss::{SequenceEvent, SequenceTracker};
pub use packet::{
    decode_header, encode_header, PacketError, PacketHeader, ProxyAddress, PublicFlags,
    MIN_DATAGRAM_LEN, VERSION_TAG,
};
pub use payload::{CounterWidth, DataPayload, WallTime};
pub use stats::{ByteCounters, StreamReport, StreamState};
