//! Stream transport
//!
//! A [`Stream`] owns one established, non-blocking socket. `send` writes one
//! full-sized data datagram per call; `recv` reads at most one datagram and,
//! while the test is running, feeds it into the stream's loss and jitter
//! accounting.

use crate::config::StreamConfig;
use crate::error::{Result, RutpError};
use rutp_io::{Clock, RutpSocket, SystemClock};
use rutp_protocol::{
    decode_header, encode_header, CounterWidth, DataPayload, ProxyAddress, SequenceEvent,
    StreamReport, StreamState,
};
use tracing::{debug, trace};

/// Phase of the surrounding test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Starting,
    Running,
    Ending,
}

/// Result of [`Stream::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The datagram went out
    Sent(usize),
    /// The socket would block; nothing was sent
    WouldBlock,
}

/// Result of [`Stream::recv`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// Nothing to read
    Idle,
    /// A datagram arrived outside the running phase and was discarded
    Drained(usize),
    /// A datagram was counted but its header or payload was unreadable
    Unparsed(usize),
    /// A datagram was counted and fed to loss and jitter accounting
    Accounted { bytes: usize, event: SequenceEvent },
}

impl RecvOutcome {
    pub fn bytes(&self) -> usize {
        match *self {
            RecvOutcome::Idle => 0,
            RecvOutcome::Drained(n) | RecvOutcome::Unparsed(n) => n,
            RecvOutcome::Accounted { bytes, .. } => bytes,
        }
    }
}

/// One established RUTP stream
pub struct Stream<C: Clock = SystemClock> {
    socket: RutpSocket,
    clock: C,
    connection_id: u64,
    proxy: Option<ProxyAddress>,
    width: CounterWidth,
    send_buf: Vec<u8>,
    recv_buf: Vec<u8>,
    state: StreamState,
}

impl Stream<SystemClock> {
    pub fn new(socket: RutpSocket, config: &StreamConfig) -> Result<Self> {
        Self::with_clock(socket, config, SystemClock)
    }
}

impl<C: Clock> Stream<C> {
    /// Wrap `socket`, switching it to non-blocking mode
    pub fn with_clock(socket: RutpSocket, config: &StreamConfig, clock: C) -> Result<Self> {
        config.validate()?;
        socket.set_nonblocking(true).map_err(RutpError::Setup)?;

        let proxy = config.proxy_or(socket.peer_addr().ok());
        let connection_id = socket.id();

        Ok(Stream {
            socket,
            clock,
            connection_id,
            proxy,
            width: config.counter_width(),
            send_buf: vec![0u8; config.block_size],
            recv_buf: vec![0u8; config.block_size],
            state: StreamState::new(),
        })
    }

    /// Send one data datagram of exactly the configured block size
    pub fn send(&mut self) -> Result<SendOutcome> {
        let sent_at = self.clock.now();
        let packet_count = self.state.next_packet_number();

        let end = encode_header(self.connection_id, self.proxy.as_ref(), &mut self.send_buf)?;
        let payload = DataPayload::new(sent_at, packet_count);
        payload
            .encode(&mut self.send_buf[end..], self.width)
            .map_err(|_| RutpError::BufferTooSmall {
                required: end + DataPayload::encoded_len(self.width),
                actual: self.send_buf.len(),
            })?;

        match self.socket.send(&self.send_buf) {
            Ok(n) => {
                self.state.bytes_mut().add_sent(n);
                trace!("Sent packet {} ({} bytes)", packet_count, n);
                Ok(SendOutcome::Sent(n))
            }
            Err(e) if e.is_would_block() => Ok(SendOutcome::WouldBlock),
            Err(e) => Err(RutpError::Send(e)),
        }
    }

    /// Receive at most one datagram
    pub fn recv(&mut self, phase: TestPhase) -> Result<RecvOutcome> {
        let n = match self.socket.recv(&mut self.recv_buf) {
            Ok(0) => return Ok(RecvOutcome::Idle),
            Ok(n) => n,
            Err(e) if e.is_would_block() => return Ok(RecvOutcome::Idle),
            Err(e) => return Err(RutpError::Recv(e)),
        };

        if phase != TestPhase::Running {
            debug!("Late receive, phase = {:?}", phase);
            return Ok(RecvOutcome::Drained(n));
        }

        self.state.bytes_mut().add_received(n);

        let datagram = &self.recv_buf[..n];
        let end = match decode_header(datagram) {
            Ok(end) => end,
            Err(e) => {
                debug!("Discarding datagram with malformed header: {}", e);
                return Ok(RecvOutcome::Unparsed(n));
            }
        };
        let payload = match DataPayload::decode(&datagram[end..], self.width) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Discarding datagram with short payload: {}", e);
                return Ok(RecvOutcome::Unparsed(n));
            }
        };

        let arrival = self.clock.now();
        let event = self.state.record_arrival(&payload, arrival);
        if let SequenceEvent::OutOfOrder { expected } = event {
            debug!(
                "Out of order on stream {}: got packet {}, expected {}",
                self.connection_id, payload.packet_count, expected
            );
        }

        Ok(RecvOutcome::Accounted { bytes: n, event })
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Point-in-time measurements
    pub fn snapshot(&self) -> StreamReport {
        self.state.report()
    }

    /// Start a new reporting interval
    pub fn reset_interval(&mut self) {
        self.state.bytes_mut().reset_interval();
    }

    pub fn socket(&self) -> &RutpSocket {
        &self.socket
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn block_size(&self) -> usize {
        self.send_buf.len()
    }

    pub fn into_socket(self) -> RutpSocket {
        self.socket
    }
}
