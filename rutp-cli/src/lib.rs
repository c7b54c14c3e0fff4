//! RUTP CLI Library
//!
//! Shared functionality for the probe driver.

pub mod config;
pub mod pacing;
pub mod stats;

pub use config::{ConfigError, ProbeConfig, Role};
pub use pacing::SendSchedule;
pub use stats::{display_summary, format_bandwidth, format_bytes, receiver_line, sender_line};
