//! Datagram Sender
//!
//! Send-only UDP socket with a single pending-payload slot. A new payload
//! replaces one that was not flushed yet; nothing is queued.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;

use bytes::Bytes;
use mio::net::UdpSocket;
use mio::{Interest, Registry, Token};
use parking_lot::Mutex;

use crate::error::{CommError, Result};
use crate::reactor::{Context, Disposition, ReactorHandle, Request, Source};

struct SenderShared {
    target: SocketAddr,

    /// Next datagram to send
    slot: Mutex<Option<Bytes>>,
}

struct SenderSource {
    socket: UdpSocket,
    shared: Arc<SenderShared>,
}

impl SenderSource {
    /// Send the slot's payload if there is one
    fn flush(&mut self) {
        let mut slot = self.shared.slot.lock();
        let Some(payload) = slot.as_ref() else {
            return;
        };
        match self.socket.send_to(payload, self.shared.target) {
            Ok(sent) => {
                tracing::trace!("sent {} byte datagram to {}", sent, self.shared.target);
                *slot = None;
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                // Slot stays as-is; the next send_data or writable event retries.
                tracing::debug!("datagram to {} failed: {}", self.shared.target, e);
            }
        }
    }
}

impl Source for SenderSource {
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.socket, token, Interest::WRITABLE)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut self.socket)
    }

    fn on_writable(&mut self, _cx: &mut Context<'_>) -> Disposition {
        self.flush();
        Disposition::Keep
    }

    fn on_closed(&mut self) {
        tracing::debug!("{} closed", self.describe());
    }

    fn describe(&self) -> String {
        format!("udp sender -> {}", self.shared.target)
    }
}

/// Send-only UDP endpoint with a fixed target
pub struct DatagramSender {
    shared: Arc<SenderShared>,
    local_addr: SocketAddr,
    token: Token,
    reactor: ReactorHandle,
}

impl DatagramSender {
    /// Open an ephemeral socket sending to `target`
    pub fn open(reactor: &ReactorHandle, target: SocketAddr) -> Result<Self> {
        let bind_ip = match target.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let socket = StdUdpSocket::bind(SocketAddr::new(bind_ip, 0))
            .map_err(|e| CommError::connection("bind udp sender", e))?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        let shared = Arc::new(SenderShared {
            target,
            slot: Mutex::new(None),
        });
        let source = SenderSource {
            socket: UdpSocket::from_std(socket),
            shared: Arc::clone(&shared),
        };
        let token = reactor.next_token();
        reactor.submit(Request::Register {
            token,
            source: Box::new(source),
        })?;

        Ok(Self {
            shared,
            local_addr,
            token,
            reactor: reactor.clone(),
        })
    }

    /// Replace the pending payload and ask the reactor to send it
    pub fn send_data(&self, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        {
            let mut slot = self.shared.slot.lock();
            if slot.is_some() {
                tracing::trace!("overwriting unsent datagram to {}", self.shared.target);
            }
            *slot = Some(payload);
        }
        self.reactor.submit(Request::Notify(self.token))
    }

    /// A payload is waiting to be sent
    pub fn has_pending(&self) -> bool {
        self.shared.slot.lock().is_some()
    }

    pub fn target(&self) -> SocketAddr {
        self.shared.target
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop sending; an unsent payload is dropped
    pub fn close(&self) {
        if let Err(e) = self.reactor.submit(Request::Close(self.token)) {
            tracing::trace!("udp sender to {} close: {}", self.shared.target, e);
        }
    }
}

impl Drop for DatagramSender {
    fn drop(&mut self) {
        self.close();
    }
}
