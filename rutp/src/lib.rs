//! RUTP - measurement probe over UDP
//!
//! High-level API: establish a stream with [`connect`] / [`Listener::accept`],
//! then drive it with [`Stream::send`] and [`Stream::recv`].

pub mod config;
pub mod error;
pub mod establish;
pub mod stream;

pub use rutp_io as io;
pub use rutp_protocol as protocol;

// Re-export commonly used types
pub use config::{ConfigError, StreamConfig};
pub use error::{ErrorCode, HandshakeStage, Result, RutpError};
pub use establish::{connect, listen, Established, Listener, ReadinessRegistry, HANDSHAKE_LEN};
pub use protocol::{SequenceEvent, StreamReport};
pub use stream::{RecvOutcome, SendOutcome, Stream, TestPhase};
