//! Stream establishment
//!
//! UDP has no accept, so a stream is established with a two-message
//! exchange. The client sends a 1000-byte probe carrying a RUTP header; a
//! fresh listener takes over the listening address for the next client, and
//! the socket that received the probe is bound to its source, tuned and
//! answers with a 1000-byte acknowledgement. That bound socket becomes the
//! stream.

use crate::config::StreamConfig;
use crate::error::{HandshakeStage, Result, RutpError};
use rutp_io::{tune, RutpSocket, TuneOutcome};
use rutp_protocol::{encode_header, PacketHeader, MIN_DATAGRAM_LEN};
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Size of the probe and of the acknowledgement
pub const HANDSHAKE_LEN: usize = MIN_DATAGRAM_LEN;

/// Readiness set the listener belongs to
///
/// When `accept` hands the listening socket over to a stream, the
/// replacement listener is registered here so the caller keeps polling it.
pub trait ReadinessRegistry {
    fn register(&mut self, listener: &RutpSocket);
}

impl<F: FnMut(&RutpSocket)> ReadinessRegistry for F {
    fn register(&mut self, listener: &RutpSocket) {
        self(listener)
    }
}

/// An established socket plus what the tuner did to it
#[derive(Debug)]
pub struct Established {
    pub socket: RutpSocket,
    pub peer: SocketAddr,
    pub tuning: TuneOutcome,
}

/// Server-side listening socket
#[derive(Debug)]
pub struct Listener {
    socket: RutpSocket,
    addr: SocketAddr,
}

impl Listener {
    /// Bind the listening address from `config`
    pub fn bind(config: &StreamConfig) -> Result<Self> {
        config.validate()?;
        let socket = RutpSocket::announce(config.listen).map_err(|source| RutpError::Listen {
            addr: config.listen,
            source,
        })?;
        // Replacements must land on the actual port, not on an ephemeral 0
        let addr = socket.local_addr().map_err(|source| RutpError::Listen {
            addr: config.listen,
            source,
        })?;
        info!("Listening on {}", addr);
        Ok(Listener { socket, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// The socket the caller should poll for the next probe
    pub fn socket(&self) -> &RutpSocket {
        &self.socket
    }

    /// Accept one client
    ///
    /// Blocks until a probe arrives. The replacement listener takes over
    /// (and is registered with `registry`) before the probed socket is bound
    /// to the client, so the listener keeps hearing every client even when
    /// the rest of the handshake fails.
    pub fn accept(
        &mut self,
        config: &StreamConfig,
        registry: &mut dyn ReadinessRegistry,
    ) -> Result<Established> {
        let mut buf = [0u8; HANDSHAKE_LEN];

        let (n, peer) = self
            .socket
            .recv_from(&mut buf)
            .map_err(RutpError::handshake(HandshakeStage::ProbeRecv))?;

        match PacketHeader::decode(&buf[..n]) {
            Ok((header, _)) => debug!(
                "Probe from {} ({} bytes), connection id {:?}, proxy {:?}",
                peer, n, header.connection_id, header.proxy
            ),
            Err(e) => debug!("Probe from {} ({} bytes) has no readable header: {}", peer, n, e),
        }

        let replacement = RutpSocket::announce(self.addr).map_err(|source| RutpError::Listen {
            addr: self.addr,
            source,
        })?;
        registry.register(&replacement);
        let socket = std::mem::replace(&mut self.socket, replacement);

        socket
            .connect_peer(peer)
            .map_err(RutpError::handshake(HandshakeStage::PeerBind))?;

        let tuning = tune(&socket, &config.tuner_settings())?;
        if tuning.undersized {
            warn!(
                "Socket buffers for {} are smaller than the {}-byte block size",
                peer, config.block_size
            );
        }

        let ack = [0u8; HANDSHAKE_LEN];
        socket
            .send(&ack)
            .map_err(RutpError::handshake(HandshakeStage::AckWrite))?;

        info!("Accepted stream from {}", peer);
        Ok(Established {
            socket,
            peer,
            tuning,
        })
    }
}

/// Bind the listening socket described by `config`
pub fn listen(config: &StreamConfig) -> Result<Listener> {
    Listener::bind(config)
}

/// Connect to the server named in `config`
///
/// Blocks until the acknowledgement arrives or the connect timeout expires.
pub fn connect(config: &StreamConfig) -> Result<Established> {
    config.validate()?;
    let server = config
        .server
        .ok_or(crate::config::ConfigError::MissingServer)?;

    let socket = RutpSocket::dial(server, config.local)
        .map_err(RutpError::handshake(HandshakeStage::Dial))?;

    let tuning = tune(&socket, &config.tuner_settings())?;
    if tuning.undersized {
        warn!(
            "Socket buffers are smaller than the {}-byte block size",
            config.block_size
        );
    }

    if let Err(e) = socket.set_read_timeout(Some(config.connect_timeout())) {
        warn!("Unable to set connect timeout: {}", e);
    }

    let mut buf = [0u8; HANDSHAKE_LEN];
    let proxy = config.proxy_or(Some(server));
    encode_header(socket.id(), proxy.as_ref(), &mut buf)?;

    socket
        .send(&buf)
        .map_err(RutpError::handshake(HandshakeStage::ProbeWrite))?;

    socket
        .recv(&mut buf)
        .map_err(RutpError::handshake(HandshakeStage::AckRead))?;

    info!("Connected to {}", server);
    Ok(Established {
        socket,
        peer: server,
        tuning,
    })
}
