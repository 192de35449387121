//! Datagram Receiver
//!
//! Bound UDP socket that is always readable and never writable.

use std::io;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;

use mio::net::UdpSocket;
use mio::{Interest, Registry, Token};

use crate::config::Config;
use crate::error::{CallbackResult, CommError, Result};
use crate::network::guard;
use crate::reactor::{Context, Disposition, ReactorHandle, Request, Source};

/// Callback receiving each datagram's payload and sender address
pub type DatagramCallback = Arc<dyn Fn(&[u8], SocketAddr) -> CallbackResult + Send + Sync>;

struct ReceiverSource {
    socket: UdpSocket,
    local_addr: SocketAddr,
    callback: Option<DatagramCallback>,
    buf: Vec<u8>,
}

impl Source for ReceiverSource {
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.socket, token, Interest::READABLE)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut self.socket)
    }

    fn on_readable(&mut self, _cx: &mut Context<'_>) -> Disposition {
        loop {
            match self.socket.recv_from(&mut self.buf) {
                Ok((len, from)) => {
                    tracing::trace!("{} received {} bytes from {}", self.describe(), len, from);
                    match &self.callback {
                        Some(callback) => {
                            let payload = &self.buf[..len];
                            guard("datagram callback", || callback(payload, from));
                        }
                        None => tracing::trace!("no callback, dropped datagram from {}", from),
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("{} receive failed: {}", self.describe(), e);
                    break;
                }
            }
        }
        Disposition::Keep
    }

    fn on_closed(&mut self) {
        tracing::debug!("{} closed", self.describe());
    }

    fn describe(&self) -> String {
        format!("udp receiver {}", self.local_addr)
    }
}

/// Receive-only UDP endpoint
pub struct DatagramReceiver {
    local_addr: SocketAddr,
    token: Token,
    reactor: ReactorHandle,
}

impl DatagramReceiver {
    /// Bind `addr`; with no callback, datagrams are read and dropped
    pub fn bind(
        reactor: &ReactorHandle,
        addr: SocketAddr,
        callback: Option<DatagramCallback>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;

        let socket = StdUdpSocket::bind(addr)
            .map_err(|e| CommError::connection(&format!("bind udp {}", addr), e))?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        let source = ReceiverSource {
            socket: UdpSocket::from_std(socket),
            local_addr,
            callback,
            buf: vec![0; config.max_datagram_size],
        };
        let token = reactor.next_token();
        reactor.submit(Request::Register {
            token,
            source: Box::new(source),
        })?;

        tracing::debug!("udp receiver bound to {}", local_addr);

        Ok(Self {
            local_addr,
            token,
            reactor: reactor.clone(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop receiving; idempotent
    pub fn close(&self) {
        if let Err(e) = self.reactor.submit(Request::Close(self.token)) {
            tracing::trace!("udp receiver {} close: {}", self.local_addr, e);
        }
    }
}

impl Drop for DatagramReceiver {
    fn drop(&mut self) {
        self.close();
    }
}
