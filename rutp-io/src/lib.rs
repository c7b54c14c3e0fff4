//! RUTP I/O and Platform Abstraction
//!
//! This crate provides the UDP socket wrapper, socket buffer and pacing
//! tuning, and the clocks used to stamp and time data datagrams.

pub mod socket;
pub mod time;
pub mod tuner;

pub use socket::{RutpSocket, SocketError};
pub use time::{Clock, ManualClock, SystemClock};
pub use tuner::{
    apply_pacing, tune, verify, BufferCheck, BufferOptions, BufferSizes, Direction, TuneOutcome,
    TunerError, TunerSettings, BUFFER_EXTRA,
};
