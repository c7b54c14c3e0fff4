//! RUTP error kinds and reporting codes

use crate::config::ConfigError;
use rutp_io::{SocketError, TunerError};
use rutp_protocol::PacketError;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

/// Handshake step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// Creating the client socket toward the server
    Dial,
    /// Waiting for the client's probe
    ProbeRecv,
    /// Binding the accepted socket to the client
    PeerBind,
    /// Sending the client's probe
    ProbeWrite,
    /// Sending the server's acknowledgement
    AckWrite,
    /// Waiting for the server's acknowledgement
    AckRead,
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStage::Dial => "dial",
            HandshakeStage::ProbeRecv => "probe receive",
            HandshakeStage::PeerBind => "peer bind",
            HandshakeStage::ProbeWrite => "probe write",
            HandshakeStage::AckWrite => "ack write",
            HandshakeStage::AckRead => "ack read",
        };
        f.write_str(name)
    }
}

/// Stable code reported to the caller for each failure site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    BadConfig = 1,
    InitStream = 2,
    StreamListen = 10,
    StreamAccept = 11,
    StreamConnect = 12,
    StreamRead = 13,
    StreamWrite = 14,
    SetBuffer = 20,
    BufferCapped = 21,
    BufferTooSmall = 22,
    BadProxyAddress = 30,
    ProtocolParse = 31,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::BadConfig => "BadConfig",
            ErrorCode::InitStream => "InitStream",
            ErrorCode::StreamListen => "StreamListen",
            ErrorCode::StreamAccept => "StreamAccept",
            ErrorCode::StreamConnect => "StreamConnect",
            ErrorCode::StreamRead => "StreamRead",
            ErrorCode::StreamWrite => "StreamWrite",
            ErrorCode::SetBuffer => "SetBuffer",
            ErrorCode::BufferCapped => "BufferCapped",
            ErrorCode::BufferTooSmall => "BufferTooSmall",
            ErrorCode::BadProxyAddress => "BadProxyAddress",
            ErrorCode::ProtocolParse => "ProtocolParse",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u16())
    }
}

/// RUTP errors
#[derive(Error, Debug)]
pub enum RutpError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Malformed header: {0}")]
    ProtocolParse(PacketError),

    #[error("Socket option error: {0}")]
    SocketOption(#[from] TunerError),

    #[error("Buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("No proxy address to put in the header")]
    InvalidAddress,

    #[error("Handshake failed at {stage}: {source}")]
    Handshake {
        stage: HandshakeStage,
        #[source]
        source: SocketError,
    },

    #[error("Unable to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: SocketError,
    },

    #[error("Unable to prepare stream socket: {0}")]
    Setup(#[source] SocketError),

    #[error("Send failed: {0}")]
    Send(#[source] SocketError),

    #[error("Receive failed: {0}")]
    Recv(#[source] SocketError),
}

impl RutpError {
    pub(crate) fn handshake(stage: HandshakeStage) -> impl FnOnce(SocketError) -> Self {
        move |source| RutpError::Handshake { stage, source }
    }

    /// Code reported to the caller
    pub fn code(&self) -> ErrorCode {
        match self {
            RutpError::Config(_) => ErrorCode::BadConfig,
            RutpError::ProtocolParse(_) => ErrorCode::ProtocolParse,
            RutpError::SocketOption(TunerError::Capped { .. }) => ErrorCode::BufferCapped,
            RutpError::SocketOption(_) => ErrorCode::SetBuffer,
            RutpError::BufferTooSmall { .. } => ErrorCode::BufferTooSmall,
            RutpError::InvalidAddress => ErrorCode::BadProxyAddress,
            RutpError::Handshake { stage, .. } => match stage {
                HandshakeStage::Dial => ErrorCode::StreamConnect,
                HandshakeStage::ProbeRecv | HandshakeStage::PeerBind => ErrorCode::StreamAccept,
                HandshakeStage::ProbeWrite | HandshakeStage::AckWrite => ErrorCode::StreamWrite,
                HandshakeStage::AckRead => ErrorCode::StreamRead,
            },
            RutpError::Listen { .. } => ErrorCode::StreamListen,
            RutpError::Setup(_) => ErrorCode::InitStream,
            RutpError::Send(_) => ErrorCode::StreamWrite,
            RutpError::Recv(_) => ErrorCode::StreamRead,
        }
    }

    /// Whether stream establishment or the stream itself must be abandoned
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RutpError::ProtocolParse(_))
    }
}

impl From<PacketError> for RutpError {
    fn from(err: PacketError) -> Self {
        match err {
            PacketError::BufferTooSmall { required, actual } => {
                RutpError::BufferTooSmall { required, actual }
            }
            PacketError::InvalidAddress => RutpError::InvalidAddress,
            parse => RutpError::ProtocolParse(parse),
        }
    }
}

pub type Result<T> = std::result::Result<T, RutpError>;
