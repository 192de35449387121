//! Tests for DatagramReceiver and DatagramSender
//!
//! These tests verify:
//! - Received datagrams reach the callback with the sender address
//! - A failing or panicking callback does not stop later datagrams
//! - The sender's single slot: a newer payload replaces an unsent one
//! - Oversized datagrams are truncated to the configured size

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use commlink::{
    CallbackResult, Config, DatagramCallback, DatagramReceiver, DatagramSender, Reactor,
    ReactorHandle,
};
use crossbeam::channel::{self, Receiver};

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Helper Functions
// =============================================================================

struct TestReactor {
    handle: ReactorHandle,
    join: Option<JoinHandle<commlink::Result<()>>>,
}

impl TestReactor {
    fn start(config: &Config) -> Self {
        let (handle, join) = Reactor::start(config).unwrap();
        Self {
            handle,
            join: Some(join),
        }
    }
}

impl Drop for TestReactor {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn localhost() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Callback forwarding every datagram to a channel
fn collecting_callback() -> (DatagramCallback, Receiver<(Vec<u8>, SocketAddr)>) {
    let (tx, rx) = channel::unbounded();
    let callback: DatagramCallback = Arc::new(move |payload: &[u8], from: SocketAddr| -> CallbackResult {
        tx.send((payload.to_vec(), from))?;
        Ok(())
    });
    (callback, rx)
}

/// Blocking socket standing in for the remote peer
fn peer_socket() -> UdpSocket {
    let socket = UdpSocket::bind(localhost()).unwrap();
    socket.set_read_timeout(Some(WAIT)).unwrap();
    socket
}

// =============================================================================
// Receiver Tests
// =============================================================================

#[test]
fn test_receiver_delivers_payload_and_sender() {
    let config = Config::default();
    let reactor = TestReactor::start(&config);
    let (callback, rx) = collecting_callback();
    let receiver = DatagramReceiver::bind(&reactor.handle, localhost(), Some(callback), &config).unwrap();

    let peer = peer_socket();
    peer.send_to(b"telemetry", receiver.local_addr()).unwrap();

    let (payload, from) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(payload, b"telemetry");
    assert_eq!(from, peer.local_addr().unwrap());
}

#[test]
fn test_receiver_survives_callback_failures() {
    let (tx, rx) = channel::unbounded();
    let callback: DatagramCallback = Arc::new(move |payload: &[u8], _from: SocketAddr| -> CallbackResult {
        match payload {
            b"error" => Err("rejected".into()),
            b"panic" => panic!("callback bug"),
            _ => {
                tx.send(payload.to_vec())?;
                Ok(())
            }
        }
    });

    let config = Config::default();
    let reactor = TestReactor::start(&config);
    let receiver = DatagramReceiver::bind(&reactor.handle, localhost(), Some(callback), &config).unwrap();

    let peer = peer_socket();
    for payload in [&b"error"[..], b"panic", b"after"] {
        peer.send_to(payload, receiver.local_addr()).unwrap();
    }

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), b"after");
}

#[test]
fn test_receiver_without_callback_drops_datagrams() {
    let config = Config::default();
    let reactor = TestReactor::start(&config);
    let receiver = DatagramReceiver::bind(&reactor.handle, localhost(), None, &config).unwrap();

    let peer = peer_socket();
    peer.send_to(b"nobody listens", receiver.local_addr()).unwrap();

    // The reactor keeps serving other endpoints afterwards
    let (callback, rx) = collecting_callback();
    let second = DatagramReceiver::bind(&reactor.handle, localhost(), Some(callback), &config).unwrap();
    peer.send_to(b"second", second.local_addr()).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().0, b"second");
}

#[test]
fn test_oversized_datagram_is_truncated() {
    let config = Config::builder().max_datagram_size(8).build();
    let reactor = TestReactor::start(&config);
    let (callback, rx) = collecting_callback();
    let receiver = DatagramReceiver::bind(&reactor.handle, localhost(), Some(callback), &config).unwrap();

    let peer = peer_socket();
    peer.send_to(b"0123456789abcdef", receiver.local_addr()).unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap().0, b"01234567");
}

// =============================================================================
// Sender Tests
// =============================================================================

#[test]
fn test_sender_delivers_datagram() {
    let reactor = TestReactor::start(&Config::default());
    let peer = peer_socket();

    let sender = DatagramSender::open(&reactor.handle, peer.local_addr().unwrap()).unwrap();
    assert_eq!(sender.target(), peer.local_addr().unwrap());
    sender.send_data(&b"status ok"[..]).unwrap();

    let mut buf = [0u8; 64];
    let (len, from) = peer.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"status ok");
    assert_eq!(from.port(), sender.local_addr().port());
    assert!(!sender.has_pending());
}

#[test]
fn test_sender_newer_payload_replaces_unsent_one() {
    // Build the loop without running it so both sends land before any flush.
    let reactor = Reactor::new(&Config::default()).unwrap();
    let handle = reactor.handle();

    let peer = peer_socket();
    peer.set_read_timeout(Some(Duration::from_millis(500))).unwrap();

    let sender = DatagramSender::open(&handle, peer.local_addr().unwrap()).unwrap();
    sender.send_data(&b"first"[..]).unwrap();
    sender.send_data(&b"second"[..]).unwrap();
    assert!(sender.has_pending());

    let join = reactor.spawn().unwrap();

    let mut buf = [0u8; 64];
    let (len, _) = peer.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"second");
    assert!(peer.recv_from(&mut buf).is_err(), "only one datagram expected");

    drop(sender);
    handle.shutdown();
    join.join().unwrap().unwrap();
}

#[test]
fn test_send_after_shutdown_fails() {
    let reactor = TestReactor::start(&Config::default());
    let peer = peer_socket();
    let sender = DatagramSender::open(&reactor.handle, peer.local_addr().unwrap()).unwrap();

    reactor.handle.shutdown();
    assert!(sender.send_data(&b"late"[..]).is_err());
}
