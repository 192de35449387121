//! Shared helpers for network tests

#![allow(dead_code)]

use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use commlink::{
    CallbackResult, ChannelHandle, CommServer, Config, Handler, LinkEvent, Reactor, ReactorHandle,
    Terminator,
};
use crossbeam::channel::{self, Receiver, Sender};

pub const WAIT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(300);

/// Handler that forwards everything it sees to channels
pub struct Recorder {
    events: Sender<(String, LinkEvent)>,
    messages: Sender<(String, Bytes)>,
}

pub struct Recorded {
    pub events: Receiver<(String, LinkEvent)>,
    pub messages: Receiver<(String, Bytes)>,
}

impl Recorder {
    pub fn new() -> (Arc<Self>, Recorded) {
        let (event_tx, event_rx) = channel::unbounded();
        let (message_tx, message_rx) = channel::unbounded();
        (
            Arc::new(Self {
                events: event_tx,
                messages: message_tx,
            }),
            Recorded {
                events: event_rx,
                messages: message_rx,
            },
        )
    }
}

impl Handler for Recorder {
    fn on_event(&self, channel: &ChannelHandle, event: LinkEvent) -> CallbackResult {
        self.events.send((channel.unit_id().to_string(), event))?;
        Ok(())
    }

    fn on_message(&self, channel: &ChannelHandle, message: Bytes) -> CallbackResult {
        self.messages.send((channel.unit_id().to_string(), message))?;
        Ok(())
    }
}

impl Recorded {
    pub fn expect_event(&self) -> (String, LinkEvent) {
        self.events.recv_timeout(WAIT).expect("timed out waiting for event")
    }

    pub fn expect_message(&self) -> (String, Bytes) {
        self.messages.recv_timeout(WAIT).expect("timed out waiting for message")
    }

    pub fn assert_no_event(&self) {
        if let Ok(event) = self.events.recv_timeout(QUIET) {
            panic!("unexpected event {:?}", event);
        }
    }
}

pub struct TestReactor {
    pub handle: ReactorHandle,
    join: Option<JoinHandle<commlink::Result<()>>>,
}

impl TestReactor {
    pub fn start(config: &Config) -> Self {
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

pub fn localhost() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

pub fn start_server(
    reactor: &TestReactor,
    handler: Arc<dyn Handler>,
    config: &Config,
) -> CommServer {
    CommServer::bind(&reactor.handle, localhost(), Terminator::line(), handler, config).unwrap()
}

/// Poll `condition` until it holds or `WAIT` elapses
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Plain blocking socket playing the remote side
pub fn raw_connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(WAIT)).unwrap();
    stream
}

/// Read until `len` bytes arrived or the peer closed
pub fn read_exact_len(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut out = vec![0; len];
    let mut filled = 0;
    while filled < len {
        match stream.read(&mut out[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => panic!("read failed after {} bytes: {}", filled, e),
        }
    }
    out.truncate(filled);
    out
}

/// True once the peer has closed its side
pub fn peer_closed(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return true,
            Ok(_) => continue,
            Err(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset => return true,
            Err(_) => return false,
        }
    }
}
