//! Shared helpers for the RUTP integration tests

#![allow(dead_code)]

use rutp::{connect, Established, Listener, RecvOutcome, Stream, StreamConfig, TestPhase};
use rutp_io::{Clock, RutpSocket};
use rutp_protocol::{encode_header, CounterWidth, DataPayload, ProxyAddress, WallTime};
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

pub fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Two sockets connected to each other over loopback
pub fn loopback_pair() -> (RutpSocket, RutpSocket) {
    let a = RutpSocket::announce(loopback()).unwrap();
    let b = RutpSocket::dial(a.local_addr().unwrap(), None).unwrap();
    a.connect_peer(b.local_addr().unwrap()).unwrap();
    (a, b)
}

/// Server and client configs for a listener on an ephemeral loopback port
pub fn loopback_configs() -> (StreamConfig, Listener) {
    let config = StreamConfig {
        listen: loopback(),
        connect_timeout_secs: 5,
        ..Default::default()
    };
    let listener = Listener::bind(&config).unwrap();
    (config, listener)
}

/// Run the full handshake over loopback; returns (server, client)
pub fn establish(config: &StreamConfig, listener: &mut Listener) -> (Established, Established) {
    let client_config = StreamConfig {
        server: Some(listener.local_addr()),
        ..config.clone()
    };
    let client = thread::spawn(move || connect(&client_config).unwrap());
    let server = listener.accept(config, &mut |_: &RutpSocket| {}).unwrap();
    (server, client.join().unwrap())
}

/// Build a complete data datagram by hand
pub fn data_datagram(
    block_size: usize,
    sent_at: WallTime,
    packet_count: u64,
    width: CounterWidth,
) -> Vec<u8> {
    let mut buf = vec![0u8; block_size];
    let proxy = ProxyAddress::from(loopback());
    let end = encode_header(7, Some(&proxy), &mut buf).unwrap();
    DataPayload::new(sent_at, packet_count)
        .encode(&mut buf[end..], width)
        .unwrap();
    buf
}

/// Poll `stream` until a datagram arrives or five seconds pass
pub fn recv_one<C: Clock>(stream: &mut Stream<C>, phase: TestPhase) -> RecvOutcome {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match stream.recv(phase).unwrap() {
            RecvOutcome::Idle if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(1))
            }
            outcome => return outcome,
        }
    }
}
