//! RUTP Packet Header Encoding and Decoding
//!
//! A RUTP datagram starts with a one-byte set of public flags followed by
//! optional fields whose presence is announced by those flags:
//!
//! ```text
//! byte 0:                public flags
//! [CONNECTION_ID] 8:     connection id (u64, big-endian)
//! [VERSION]       4:     version tag ("Q042")
//! [PROXY]         1:     proxy address type (1 = IPv4, 2 = IPv6)
//!                 4|16:  proxy address octets
//!                 2:     proxy port (network byte order)
//! ```
//!
//! Data datagrams carry a [`DataPayload`](crate::payload::DataPayload)
//! immediately after the header.

use crate::cursor::{CursorError, ReadCursor, WriteCursor};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;

/// Minimum buffer length for header construction, probes and acks
pub const MIN_DATAGRAM_LEN: usize = 1000;

/// Version tag carried when the VERSION flag is set
pub const VERSION_TAG: [u8; 4] = *b"Q042";

/// Proxy address type byte for IPv4
pub const PROXY_TYPE_IPV4: u8 = 1;

/// Proxy address type byte for IPv6
pub const PROXY_TYPE_IPV6: u8 = 2;

/// Largest header this module produces (flags + cid + version + IPv6 proxy)
pub const MAX_HEADER_LEN: usize = 1 + 8 + 4 + 1 + 16 + 2;

/// Packet number length announced in bits 4-5 of the public flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketNumberLength {
    /// 1-byte packet number
    One = 0b00,
    /// 2-byte packet number
    Two = 0b01,
    /// 4-byte packet number
    Four = 0b10,
    /// 6-byte packet number
    Six = 0b11,
}

impl PacketNumberLength {
    pub fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => PacketNumberLength::One,
            0b01 => PacketNumberLength::Two,
            0b10 => PacketNumberLength::Four,
            0b11 => PacketNumberLength::Six,
            _ => unreachable!(),
        }
    }

    /// Length in bytes
    pub fn byte_len(self) -> usize {
        match self {
            PacketNumberLength::One => 1,
            PacketNumberLength::Two => 2,
            PacketNumberLength::Four => 4,
            PacketNumberLength::Six => 6,
        }
    }
}

/// Public flags byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PublicFlags(u8);

impl PublicFlags {
    /// Bit 0: header contains a version tag
    pub const VERSION: u8 = 1 << 0;
    /// Bit 1: public reset packet
    pub const RESET: u8 = 1 << 1;
    /// Bit 2: header includes a nonce
    pub const NONCE: u8 = 1 << 2;
    /// Bit 3: 8-byte connection id present
    pub const CONNECTION_ID: u8 = 1 << 3;
    /// Bits 4-5: packet number length
    pub const PACKET_NUMBER_MASK: u8 = 0b11 << 4;
    /// Bit 6: proxy address present
    pub const PROXY: u8 = 1 << 6;
    /// Bit 7: a second flags byte follows
    pub const EXTENDED: u8 = 1 << 7;

    /// Flags set on every header this module produces
    pub const fn data() -> Self {
        PublicFlags(Self::VERSION | Self::CONNECTION_ID | Self::PROXY)
    }

    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        PublicFlags(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u8 {
        self.0
    }

    #[inline]
    fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn has_version(self) -> bool {
        self.has(Self::VERSION)
    }

    pub fn is_reset(self) -> bool {
        self.has(Self::RESET)
    }

    pub fn has_nonce(self) -> bool {
        self.has(Self::NONCE)
    }

    pub fn has_connection_id(self) -> bool {
        self.has(Self::CONNECTION_ID)
    }

    pub fn has_proxy(self) -> bool {
        self.has(Self::PROXY)
    }

    pub fn is_extended(self) -> bool {
        self.has(Self::EXTENDED)
    }

    pub fn packet_number_length(self) -> PacketNumberLength {
        PacketNumberLength::from_bits((self.0 & Self::PACKET_NUMBER_MASK) >> 4)
    }
}

impl fmt::Debug for PublicFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicFlags")
            .field("raw", &format_args!("{:#010b}", self.0))
            .field("version", &self.has_version())
            .field("reset", &self.is_reset())
            .field("nonce", &self.has_nonce())
            .field("connection_id", &self.has_connection_id())
            .field("packet_number_length", &self.packet_number_length())
            .field("proxy", &self.has_proxy())
            .field("extended", &self.is_extended())
            .finish()
    }
}

/// Destination hint carried in the header
///
/// Independent of the socket's own peer address. On the wire the port
/// follows the address octets in network byte order, which is exactly how a
/// platform socket address stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyAddress {
    V4 { ip: Ipv4Addr, port: u16 },
    V6 { ip: Ipv6Addr, port: u16 },
}

impl ProxyAddress {
    /// Type byte written before the address
    pub fn type_byte(&self) -> u8 {
        match self {
            ProxyAddress::V4 { .. } => PROXY_TYPE_IPV4,
            ProxyAddress::V6 { .. } => PROXY_TYPE_IPV6,
        }
    }

    /// Encoded length including the type byte
    pub fn encoded_len(&self) -> usize {
        match self {
            ProxyAddress::V4 { .. } => 1 + 4 + 2,
            ProxyAddress::V6 { .. } => 1 + 16 + 2,
        }
    }

    pub fn to_socket_addr(self) -> SocketAddr {
        match self {
            ProxyAddress::V4 { ip, port } => SocketAddr::from((ip, port)),
            ProxyAddress::V6 { ip, port } => SocketAddr::from((ip, port)),
        }
    }

    fn write(&self, cur: &mut WriteCursor<'_>) -> Result<(), CursorError> {
        cur.write_u8(self.type_byte())?;
        match self {
            ProxyAddress::V4 { ip, port } => {
                cur.write_slice(&ip.octets())?;
                cur.write_u16(*port)
            }
            ProxyAddress::V6 { ip, port } => {
                cur.write_slice(&ip.octets())?;
                cur.write_u16(*port)
            }
        }
    }

    fn read(cur: &mut ReadCursor<'_>) -> Result<Self, PacketError> {
        match cur.read_u8()? {
            PROXY_TYPE_IPV4 => {
                let octets: [u8; 4] = cur.read_array()?;
                let port = cur.read_u16()?;
                Ok(ProxyAddress::V4 {
                    ip: Ipv4Addr::from(octets),
                    port,
                })
            }
            PROXY_TYPE_IPV6 => {
                let octets: [u8; 16] = cur.read_array()?;
                let port = cur.read_u16()?;
                Ok(ProxyAddress::V6 {
                    ip: Ipv6Addr::from(octets),
                    port,
                })
            }
            other => Err(PacketError::InvalidProxyType(other)),
        }
    }
}

impl From<SocketAddr> for ProxyAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(a) => ProxyAddress::V4 {
                ip: *a.ip(),
                port: a.port(),
            },
            SocketAddr::V6(a) => ProxyAddress::V6 {
                ip: *a.ip(),
                port: a.port(),
            },
        }
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_socket_addr().fmt(f)
    }
}

/// Decoded packet header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Public flags as received
    pub flags: PublicFlags,
    /// Sender's opaque connection id
    pub connection_id: Option<u64>,
    /// Version tag (not validated)
    pub version: Option<[u8; 4]>,
    /// Proxy destination hint
    pub proxy: Option<ProxyAddress>,
}

impl PacketHeader {
    /// Header as produced by this implementation
    pub fn new(connection_id: u64, proxy: ProxyAddress) -> Self {
        PacketHeader {
            flags: PublicFlags::data(),
            connection_id: Some(connection_id),
            version: Some(VERSION_TAG),
            proxy: Some(proxy),
        }
    }

    /// Encoded length of this header
    pub fn encoded_len(&self) -> usize {
        1 + self.connection_id.map_or(0, |_| 8)
            + self.version.map_or(0, |_| 4)
            + self.proxy.as_ref().map_or(0, ProxyAddress::encoded_len)
    }

    /// Write the header at the start of `buf`, returning the payload offset
    ///
    /// Optional fields are written when both present and announced by the
    /// flags, so the output always decodes back to the same offset.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        let mut cur = WriteCursor::new(buf);
        cur.write_u8(self.flags.as_raw())?;

        if let (true, Some(cid)) = (self.flags.has_connection_id(), self.connection_id) {
            cur.write_u64(cid)?;
        }
        if let (true, Some(tag)) = (self.flags.has_version(), self.version) {
            cur.write_slice(&tag)?;
        }
        if let (true, Some(proxy)) = (self.flags.has_proxy(), self.proxy.as_ref()) {
            proxy.write(&mut cur)?;
        }

        Ok(cur.position())
    }

    /// Parse a header from the start of a received datagram
    ///
    /// Returns the header and the offset at which the payload begins.
    /// Reserved flag bits are ignored.
    pub fn decode(datagram: &[u8]) -> Result<(Self, usize), PacketError> {
        let mut cur = ReadCursor::new(datagram);
        let flags = PublicFlags::from_raw(cur.read_u8()?);

        let connection_id = if flags.has_connection_id() {
            Some(cur.read_u64()?)
        } else {
            None
        };

        let version = if flags.has_version() {
            Some(cur.read_array::<4>()?)
        } else {
            None
        };

        let proxy = if flags.has_proxy() {
            Some(ProxyAddress::read(&mut cur)?)
        } else {
            None
        };

        let header = PacketHeader {
            flags,
            connection_id,
            version,
            proxy,
        };
        Ok((header, cur.position()))
    }
}

/// Encode a header into a datagram buffer
///
/// The buffer must be at least [`MIN_DATAGRAM_LEN`] bytes and a proxy
/// address is mandatory. Only the header region is written; the rest of
/// `buf` is left as is. Returns the offset where the payload begins.
pub fn encode_header(
    connection_id: u64,
    proxy: Option<&ProxyAddress>,
    buf: &mut [u8],
) -> Result<usize, PacketError> {
    if buf.len() < MIN_DATAGRAM_LEN {
        return Err(PacketError::BufferTooSmall {
            required: MIN_DATAGRAM_LEN,
            actual: buf.len(),
        });
    }
    let proxy = proxy.ok_or(PacketError::InvalidAddress)?;

    PacketHeader::new(connection_id, *proxy).encode(buf)
}

/// Decode a received datagram's header, returning the payload offset
pub fn decode_header(datagram: &[u8]) -> Result<usize, PacketError> {
    let (header, offset) = PacketHeader::decode(datagram)?;

    if let Some(cid) = header.connection_id {
        tracing::trace!(connection_id = cid, "decoded header");
    }

    Ok(offset)
}

/// Header encoding and parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("Missing proxy address")]
    InvalidAddress,

    #[error("Invalid proxy address type: {0}")]
    InvalidProxyType(u8),

    #[error("Truncated datagram: {0}")]
    Truncated(#[from] CursorError),
}

impl PacketError {
    /// Whether this error came from parsing received bytes
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            PacketError::InvalidProxyType(_) | PacketError::Truncated(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4_proxy() -> ProxyAddress {
        "10.1.2.3:5201".parse::<SocketAddr>().unwrap().into()
    }

    fn v6_proxy() -> ProxyAddress {
        "[2001:db8::1]:443".parse::<SocketAddr>().unwrap().into()
    }

    #[test]
    fn test_public_flags() {
        let flags = PublicFlags::data();
        assert!(flags.has_version());
        assert!(flags.has_connection_id());
        assert!(flags.has_proxy());
        assert!(!flags.is_reset());
        assert!(!flags.has_nonce());
        assert!(!flags.is_extended());
        assert_eq!(flags.as_raw(), 0b0100_1001);
    }

    #[test]
    fn test_packet_number_length() {
        assert_eq!(
            PublicFlags::from_raw(0x00).packet_number_length(),
            PacketNumberLength::One
        );
        assert_eq!(
            PublicFlags::from_raw(0x10).packet_number_length(),
            PacketNumberLength::Two
        );
        assert_eq!(
            PublicFlags::from_raw(0x20).packet_number_length(),
            PacketNumberLength::Four
        );
        assert_eq!(PublicFlags::from_raw(0x30).packet_number_length().byte_len(), 6);
    }

    #[test]
    fn test_encode_ipv4_layout() {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        let end = encode_header(0x0102_0304_0506_0708, Some(&v4_proxy()), &mut buf).unwrap();

        assert_eq!(end, 1 + 8 + 4 + 1 + 4 + 2);
        assert_eq!(buf[0], 0x49);
        assert_eq!(&buf[1..9], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&buf[9..13], b"Q042");
        assert_eq!(buf[13], PROXY_TYPE_IPV4);
        assert_eq!(&buf[14..18], &[10, 1, 2, 3]);
        assert_eq!(&buf[18..20], &5201u16.to_be_bytes());
    }

    #[test]
    fn test_encode_ipv6_layout() {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        let end = encode_header(7, Some(&v6_proxy()), &mut buf).unwrap();

        assert_eq!(end, MAX_HEADER_LEN);
        assert_eq!(buf[13], PROXY_TYPE_IPV6);
        assert_eq!(&buf[30..32], &443u16.to_be_bytes());
    }

    #[test]
    fn test_encode_rejects_small_buffer() {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN - 1];
        let err = encode_header(1, Some(&v4_proxy()), &mut buf).unwrap_err();
        assert_eq!(
            err,
            PacketError::BufferTooSmall {
                required: MIN_DATAGRAM_LEN,
                actual: MIN_DATAGRAM_LEN - 1
            }
        );
    }

    #[test]
    fn test_encode_requires_proxy() {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        assert_eq!(
            encode_header(1, None, &mut buf).unwrap_err(),
            PacketError::InvalidAddress
        );
    }

    #[test]
    fn test_decode_roundtrip() {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        let end = encode_header(42, Some(&v6_proxy()), &mut buf).unwrap();

        let (header, offset) = PacketHeader::decode(&buf).unwrap();
        assert_eq!(offset, end);
        assert_eq!(header.connection_id, Some(42));
        assert_eq!(header.version, Some(VERSION_TAG));
        assert_eq!(header.proxy, Some(v6_proxy()));
    }

    #[test]
    fn test_decode_flags_only() {
        // No optional fields announced: payload starts right after the flags
        assert_eq!(decode_header(&[0x00, 0xAA, 0xBB]).unwrap(), 1);
        // Reserved bits are ignored
        assert_eq!(decode_header(&[0x80 | 0x02 | 0x04 | 0x30]).unwrap(), 1);
    }

    #[test]
    fn test_decode_version_without_cid() {
        let data = [PublicFlags::VERSION, b'X', b'Y', b'Z', b'W', 0xFF];
        let (header, offset) = PacketHeader::decode(&data).unwrap();
        assert_eq!(offset, 5);
        assert_eq!(header.connection_id, None);
        assert_eq!(header.version, Some(*b"XYZW"));
    }

    #[test]
    fn test_decode_bad_proxy_type() {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        encode_header(1, Some(&v4_proxy()), &mut buf).unwrap();
        buf[13] = 3;

        let err = decode_header(&buf).unwrap_err();
        assert_eq!(err, PacketError::InvalidProxyType(3));
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_decode_truncated_at_every_offset() {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        let end = encode_header(99, Some(&v6_proxy()), &mut buf).unwrap();

        for len in 0..end {
            let err = decode_header(&buf[..len]).unwrap_err();
            assert!(err.is_parse_error(), "len {} gave {:?}", len, err);
        }
        assert_eq!(decode_header(&buf[..end]).unwrap(), end);
    }

    #[test]
    fn test_encode_only_touches_header_region() {
        let mut buf = vec![0xEEu8; MIN_DATAGRAM_LEN];
        let end = encode_header(1, Some(&v4_proxy()), &mut buf).unwrap();
        assert!(buf[end..].iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn test_proxy_display() {
        assert_eq!(v4_proxy().to_string(), "10.1.2.3:5201");
        assert_eq!(v6_proxy().to_string(), "[2001:db8::1]:443");
    }
}
