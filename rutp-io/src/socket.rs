//! UDP socket wrapper for RUTP
//!
//! Provides the datagram primitives the handshake and the stream transport
//! need: listener creation with address reuse, dialing toward a server,
//! binding the remote side to a single peer, buffer and pacing options.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Socket configuration errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,

    #[error("Socket option not supported on this platform")]
    UnsupportedOption,
}

impl SocketError {
    /// True for a non-blocking read/write that found nothing to do,
    /// including an expired receive timeout
    pub fn is_would_block(&self) -> bool {
        matches!(
            self,
            SocketError::Io(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut
        )
    }
}

/// RUTP socket wrapper
///
/// Wraps a UDP socket; sockets start in blocking mode since the handshake
/// blocks, and are switched to non-blocking once a stream is established.
#[derive(Debug)]
pub struct RutpSocket {
    inner: Socket,
}

fn domain_for(addr: &SocketAddr) -> Domain {
    if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    }
}

impl RutpSocket {
    /// Create a socket bound to `addr` that accepts datagrams from anyone
    ///
    /// Address reuse is enabled so a replacement listener can be bound to
    /// the same address while the previous one stays bound to its peer.
    pub fn announce(addr: SocketAddr) -> Result<Self, SocketError> {
        let socket = Socket::new(domain_for(&addr), Type::DGRAM, Some(Protocol::UDP))?;

        socket.set_reuse_address(true)?;
        // BSD stacks only share a unicast UDP port with SO_REUSEPORT
        #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
        socket.set_reuse_port(true)?;
        if addr.is_ipv6() {
            socket.set_only_v6(false)?;
        }
        socket.bind(&addr.into())?;

        Ok(RutpSocket { inner: socket })
    }

    /// Create a socket connected toward `remote`, optionally bound locally
    pub fn dial(remote: SocketAddr, local: Option<SocketAddr>) -> Result<Self, SocketError> {
        let socket = Socket::new(domain_for(&remote), Type::DGRAM, Some(Protocol::UDP))?;

        if let Some(local) = local {
            if local.is_ipv4() != remote.is_ipv4() {
                return Err(SocketError::InvalidAddress);
            }
            socket.bind(&local.into())?;
        }
        socket.connect(&remote.into())?;

        Ok(RutpSocket { inner: socket })
    }

    /// Restrict this socket to a single peer
    pub fn connect_peer(&self, peer: SocketAddr) -> Result<(), SocketError> {
        self.inner.connect(&peer.into())?;
        Ok(())
    }

    /// Opaque identifier for diagnostics (the OS handle value)
    pub fn id(&self) -> u64 {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;
            self.inner.as_raw_fd() as u64
        }
        #[cfg(windows)]
        {
            use std::os::windows::io::AsRawSocket;
            self.inner.as_raw_socket()
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), SocketError> {
        self.inner.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Set (or clear) the receive timeout
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), SocketError> {
        self.inner.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Set the send buffer size
    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_send_buffer_size(size)?;
        Ok(())
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the send buffer size
    pub fn send_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(self.inner.send_buffer_size()?)
    }

    /// Get the receive buffer size
    pub fn recv_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(self.inner.recv_buffer_size()?)
    }

    /// Set kernel transmit pacing in bytes per second
    #[cfg(target_os = "linux")]
    pub fn set_max_pacing_rate(&self, bytes_per_sec: u32) -> Result<(), SocketError> {
        use std::os::fd::AsRawFd;

        let rate: libc::c_uint = bytes_per_sec;
        // SAFETY: the descriptor is owned by self and `rate` outlives the call.
        let ret = unsafe {
            libc::setsockopt(
                self.inner.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_MAX_PACING_RATE,
                &rate as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_uint>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(SocketError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Set kernel transmit pacing in bytes per second
    #[cfg(not(target_os = "linux"))]
    pub fn set_max_pacing_rate(&self, _bytes_per_sec: u32) -> Result<(), SocketError> {
        Err(SocketError::UnsupportedOption)
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Get the peer address this socket is connected to
    pub fn peer_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .peer_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Send a datagram to the connected peer
    pub fn send(&self, buf: &[u8]) -> Result<usize, SocketError> {
        Ok(self.inner.send(buf)?)
    }

    /// Receive a datagram from the connected peer
    ///
    /// Datagrams longer than `buf` are truncated.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, SocketError> {
        // SAFETY: an initialized buffer is always a valid MaybeUninit buffer,
        // and recv only writes into it.
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };
        Ok(self.inner.recv(uninit_buf)?)
    }

    /// Receive a datagram and the address it came from
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        // SAFETY: as in `recv`.
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };

        let (n, addr) = self.inner.recv_from(uninit_buf)?;
        Ok((n, addr.as_socket().ok_or(SocketError::InvalidAddress)?))
    }

    /// Get a reference to the underlying socket
    pub fn as_socket(&self) -> &Socket {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_announce() {
        let socket = RutpSocket::announce(loopback()).unwrap();
        let addr = socket.local_addr().unwrap();
        assert!(addr.port() > 0);
        assert!(socket.peer_addr().is_err());
    }

    #[test]
    fn test_announce_same_port_twice() {
        let first = RutpSocket::announce(loopback()).unwrap();
        let addr = first.local_addr().unwrap();
        let second = RutpSocket::announce(addr).unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[test]
    fn test_dial_and_exchange() {
        let server = RutpSocket::announce(loopback()).unwrap();
        let server_addr = server.local_addr().unwrap();

        let client = RutpSocket::dial(server_addr, None).unwrap();
        assert_eq!(client.peer_addr().unwrap(), server_addr);

        client.send(b"Hello, RUTP!").unwrap();

        let mut buf = [0u8; 64];
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let (n, from) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"Hello, RUTP!");
        assert_eq!(from, client.local_addr().unwrap());

        server.connect_peer(from).unwrap();
        server.send(b"ack").unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let n = client.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ack");
    }

    #[test]
    fn test_dial_family_mismatch() {
        let err = RutpSocket::dial(
            "127.0.0.1:9".parse().unwrap(),
            Some("[::1]:0".parse().unwrap()),
        )
        .unwrap_err();
        assert!(matches!(err, SocketError::InvalidAddress));
    }

    #[test]
    fn test_nonblocking_recv_would_block() {
        let socket = RutpSocket::announce(loopback()).unwrap();
        socket.set_nonblocking(true).unwrap();

        let mut buf = [0u8; 16];
        let err = socket.recv(&mut buf).unwrap_err();
        assert!(err.is_would_block());
    }

    #[test]
    fn test_socket_buffer_sizes() {
        let socket = RutpSocket::announce(loopback()).unwrap();

        socket.set_send_buffer_size(65536).unwrap();
        socket.set_recv_buffer_size(65536).unwrap();

        // May not match exactly due to OS limits
        assert!(socket.send_buffer_size().unwrap() > 0);
        assert!(socket.recv_buffer_size().unwrap() > 0);
    }

    #[test]
    fn test_socket_ipv6() {
        // May fail on systems without IPv6
        if let Ok(socket) = RutpSocket::announce("[::1]:0".parse().unwrap()) {
            let addr = socket.local_addr().unwrap();
            assert!(addr.is_ipv6());
        }
    }
}
