//! Property-based tests for RUTP header handling
//!
//! Headers are decoded from untrusted datagrams, so decoding must never
//! panic and must agree with what encoding produced.

use bytes::{BufMut, BytesMut};
use proptest::prelude::*;
use rutp_protocol::{
    decode_header, encode_header, CounterWidth, DataPayload, PacketError, PacketHeader,
    ProxyAddress, StreamState, WallTime, MIN_DATAGRAM_LEN,
};
use std::net::{Ipv4Addr, Ipv6Addr};

// Property test strategies

fn proxy_strategy() -> impl Strategy<Value = ProxyAddress> {
    prop_oneof![
        (any::<[u8; 4]>(), any::<u16>()).prop_map(|(ip, port)| ProxyAddress::V4 {
            ip: Ipv4Addr::from(ip),
            port,
        }),
        (any::<[u8; 16]>(), any::<u16>()).prop_map(|(ip, port)| ProxyAddress::V6 {
            ip: Ipv6Addr::from(ip),
            port,
        }),
    ]
}

fn width_strategy() -> impl Strategy<Value = CounterWidth> {
    prop_oneof![Just(CounterWidth::Bits32), Just(CounterWidth::Bits64)]
}

proptest! {
    #[test]
    fn prop_encode_decode_header(cid in any::<u64>(), proxy in proxy_strategy()) {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        let written = encode_header(cid, Some(&proxy), &mut buf).unwrap();

        let (header, consumed) = PacketHeader::decode(&buf).unwrap();
        prop_assert_eq!(consumed, written);
        prop_assert_eq!(decode_header(&buf).unwrap(), written);
        prop_assert_eq!(header.connection_id, Some(cid));
        prop_assert_eq!(header.proxy, Some(proxy));

        // Re-encoding the decoded header reproduces the same bytes
        let mut again = vec![0u8; MIN_DATAGRAM_LEN];
        let rewritten = header.encode(&mut again).unwrap();
        prop_assert_eq!(rewritten, written);
        prop_assert_eq!(&again[..rewritten], &buf[..written]);
    }

    #[test]
    fn prop_decode_arbitrary_bytes_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(end) = decode_header(&data) {
            prop_assert!(end <= data.len());
        }
    }

    #[test]
    fn prop_truncated_header_is_rejected(cid in any::<u64>(), proxy in proxy_strategy(), cut in 0usize..38) {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        let written = encode_header(cid, Some(&proxy), &mut buf).unwrap();
        let cut = cut.min(written - 1);

        let err = decode_header(&buf[..cut]).unwrap_err();
        prop_assert!(err.is_parse_error());
    }

    #[test]
    fn prop_unknown_proxy_type(cid in any::<u64>(), kind in 3u8..=255) {
        let mut datagram = BytesMut::with_capacity(MIN_DATAGRAM_LEN);
        datagram.put_u8(0x49);
        datagram.put_u64(cid);
        datagram.put_slice(b"Q042");
        datagram.put_u8(kind);
        datagram.resize(MIN_DATAGRAM_LEN, 0);

        prop_assert!(matches!(
            decode_header(&datagram),
            Err(PacketError::InvalidProxyType(k)) if k == kind
        ));
    }

    #[test]
    fn prop_short_buffers_rejected(len in 0usize..MIN_DATAGRAM_LEN, proxy in proxy_strategy()) {
        let mut buf = vec![0u8; len];
        let is_too_small = matches!(
            encode_header(1, Some(&proxy), &mut buf),
            Err(PacketError::BufferTooSmall { .. })
        );
        prop_assert!(is_too_small);
    }

    #[test]
    fn prop_payload_survives_datagram(
        secs in any::<u32>(),
        usecs in 0u32..1_000_000,
        count in any::<u32>(),
        width in width_strategy(),
        proxy in proxy_strategy(),
    ) {
        let mut buf = vec![0u8; MIN_DATAGRAM_LEN];
        let end = encode_header(42, Some(&proxy), &mut buf).unwrap();
        let payload = DataPayload::new(WallTime::new(secs, usecs), count as u64);
        payload.encode(&mut buf[end..], width).unwrap();

        let start = decode_header(&buf).unwrap();
        prop_assert_eq!(DataPayload::decode(&buf[start..], width).unwrap(), payload);
    }

    #[test]
    fn prop_loss_never_exceeds_highest(counts in proptest::collection::vec(1u64..200, 1..100)) {
        let mut state = StreamState::new();
        let arrival = WallTime::new(10, 0);
        for count in counts {
            state.record_arrival(&DataPayload::new(WallTime::new(9, 0), count), arrival);
        }

        let report = state.report();
        prop_assert!(report.lost < report.highest_seen);
        prop_assert!(report.jitter_ms >= 0.0);
    }
}
