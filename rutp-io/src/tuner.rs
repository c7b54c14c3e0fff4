//! Socket buffer sizing and transmit pacing
//!
//! A stream needs socket buffers large enough to hold at least one block.
//! [`verify`] applies an explicitly requested size and checks what the
//! platform actually granted; [`tune`] adds the fallback policy of growing
//! a default-sized buffer once when it is too small for the block size.

use crate::socket::{RutpSocket, SocketError};
use std::fmt;
use std::io;
use thiserror::Error;

/// Extra room added to the block size when growing undersized buffers
pub const BUFFER_EXTRA: usize = 1024;

/// Socket options the tuner needs
pub trait BufferOptions {
    fn set_send_buffer_size(&self, size: usize) -> io::Result<()>;
    fn set_recv_buffer_size(&self, size: usize) -> io::Result<()>;
    fn send_buffer_size(&self) -> io::Result<usize>;
    fn recv_buffer_size(&self) -> io::Result<usize>;
    /// Kernel pacing in bytes per second
    fn set_max_pacing_rate(&self, bytes_per_sec: u32) -> io::Result<()>;
}

fn into_io(err: SocketError) -> io::Error {
    match err {
        SocketError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Unsupported, other),
    }
}

impl BufferOptions for RutpSocket {
    fn set_send_buffer_size(&self, size: usize) -> io::Result<()> {
        RutpSocket::set_send_buffer_size(self, size).map_err(into_io)
    }

    fn set_recv_buffer_size(&self, size: usize) -> io::Result<()> {
        RutpSocket::set_recv_buffer_size(self, size).map_err(into_io)
    }

    fn send_buffer_size(&self) -> io::Result<usize> {
        RutpSocket::send_buffer_size(self).map_err(into_io)
    }

    fn recv_buffer_size(&self) -> io::Result<usize> {
        RutpSocket::recv_buffer_size(self).map_err(into_io)
    }

    fn set_max_pacing_rate(&self, bytes_per_sec: u32) -> io::Result<()> {
        RutpSocket::set_max_pacing_rate(self, bytes_per_sec).map_err(into_io)
    }
}

/// Buffer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "sending"),
            Direction::Receive => write!(f, "receiving"),
        }
    }
}

/// Requested and observed buffer sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferSizes {
    /// Size explicitly requested (0 = platform default)
    pub requested: usize,
    /// Send buffer size reported by the platform
    pub send: usize,
    /// Receive buffer size reported by the platform
    pub recv: usize,
}

/// Result of a successful buffer check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferCheck {
    /// Both buffers hold at least one block
    Ok(BufferSizes),
    /// At least one buffer is smaller than the block size
    Undersized(BufferSizes),
}

impl BufferCheck {
    pub fn sizes(&self) -> BufferSizes {
        match self {
            BufferCheck::Ok(s) | BufferCheck::Undersized(s) => *s,
        }
    }

    pub fn is_undersized(&self) -> bool {
        matches!(self, BufferCheck::Undersized(_))
    }
}

/// Hard buffer sizing failures
#[derive(Error, Debug)]
pub enum TunerError {
    #[error("Unable to set {direction} socket buffer to {size}: {source}")]
    SetBuffer {
        direction: Direction,
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("Unable to read {direction} socket buffer size: {source}")]
    ReadBuffer {
        direction: Direction,
        #[source]
        source: io::Error,
    },

    #[error("{direction} socket buffer capped at {actual}, requested {requested}")]
    Capped {
        direction: Direction,
        requested: usize,
        actual: usize,
    },
}

/// Apply `desired` (if nonzero) and check the buffers against `block_size`
pub fn verify<S: BufferOptions + ?Sized>(
    socket: &S,
    desired: usize,
    block_size: usize,
) -> Result<BufferCheck, TunerError> {
    // Both directions, so the same socket works for either send or receive
    if desired != 0 {
        socket
            .set_recv_buffer_size(desired)
            .map_err(|source| TunerError::SetBuffer {
                direction: Direction::Receive,
                size: desired,
                source,
            })?;
        socket
            .set_send_buffer_size(desired)
            .map_err(|source| TunerError::SetBuffer {
                direction: Direction::Send,
                size: desired,
                source,
            })?;
    }

    let mut undersized = false;
    let mut check = |direction: Direction, actual: usize| -> Result<(), TunerError> {
        tracing::debug!(%direction, actual, expected = desired, "socket buffer size");
        if desired != 0 && desired > actual {
            return Err(TunerError::Capped {
                direction,
                requested: desired,
                actual,
            });
        }
        if block_size > actual {
            tracing::warn!(
                "Block size {} > {} socket buffer size {}",
                block_size,
                direction,
                actual
            );
            undersized = true;
        }
        Ok(())
    };

    let send = socket
        .send_buffer_size()
        .map_err(|source| TunerError::ReadBuffer {
            direction: Direction::Send,
            source,
        })?;
    check(Direction::Send, send)?;

    let recv = socket
        .recv_buffer_size()
        .map_err(|source| TunerError::ReadBuffer {
            direction: Direction::Receive,
            source,
        })?;
    check(Direction::Receive, recv)?;

    let sizes = BufferSizes {
        requested: desired,
        send,
        recv,
    };
    tracing::debug!(
        sock_bufsize = sizes.requested,
        sndbuf_actual = sizes.send,
        rcvbuf_actual = sizes.recv,
        "socket buffers"
    );

    Ok(if undersized {
        BufferCheck::Undersized(sizes)
    } else {
        BufferCheck::Ok(sizes)
    })
}

/// Buffer and pacing settings for one socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunerSettings {
    /// Explicit socket buffer size (0 = platform default)
    pub socket_bufsize: usize,
    /// Datagram block size
    pub block_size: usize,
    /// Kernel fair-queue pacing rate in bits per second (0 = off)
    pub fq_rate_bps: u64,
    /// Application send rate in bits per second (0 = unlimited)
    pub rate_bps: u64,
}

/// Result of [`tune`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneOutcome {
    /// Sizes observed by the last check
    pub sizes: BufferSizes,
    /// Buffer size requested by the fallback, if it ran
    pub escalated_to: Option<usize>,
    /// Buffers still smaller than a block after tuning
    pub undersized: bool,
    /// Kernel pacing was applied
    pub paced: bool,
}

/// Verify buffers, grow default-sized ones once if too small, apply pacing
pub fn tune<S: BufferOptions + ?Sized>(
    socket: &S,
    settings: &TunerSettings,
) -> Result<TuneOutcome, TunerError> {
    let mut check = verify(socket, settings.socket_bufsize, settings.block_size)?;
    let mut escalated_to = None;

    if check.is_undersized() && settings.socket_bufsize == 0 {
        let bufsize = settings.block_size + BUFFER_EXTRA;
        tracing::info!("Increasing socket buffer size to {}", bufsize);
        escalated_to = Some(bufsize);
        check = verify(socket, bufsize, settings.block_size)?;
    }

    let paced = apply_pacing(socket, settings.fq_rate_bps);

    let rate = settings.rate_bps / 8;
    if rate > 0 {
        tracing::debug!("Setting application pacing to {}", rate);
    }

    Ok(TuneOutcome {
        sizes: check.sizes(),
        escalated_to,
        undersized: check.is_undersized(),
        paced,
    })
}

/// Apply kernel pacing; failures are warnings only
///
/// Returns whether pacing is now in effect.
pub fn apply_pacing<S: BufferOptions + ?Sized>(socket: &S, fq_rate_bps: u64) -> bool {
    let bytes_per_sec = u32::try_from(fq_rate_bps / 8).unwrap_or(u32::MAX);
    if bytes_per_sec == 0 {
        return false;
    }

    tracing::debug!("Setting fair-queue socket pacing to {}", bytes_per_sec);
    match socket.set_max_pacing_rate(bytes_per_sec) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Unable to set socket pacing: {}", e);
            false
        }
    }
}
