//! Byte-Stream Channel
//!
//! One connected TCP socket: frames inbound bytes on the terminator and
//! serializes outbound sends.
//!
//! A channel is split in two halves:
//! - [`ChannelHandle`]: cloneable, used by the application from any thread
//! - `StreamChannel`: owned by the reactor, holds the socket and inbound buffer

use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use parking_lot::Mutex;

use super::handler::{guard, Handler, LinkEvent, LinkObserver};
use crate::config::Config;
use crate::error::{CommError, Result};
use crate::framing::{FrameBuffer, Terminator};
use crate::reactor::{Context, Disposition, ReactorHandle, Request, Source};

/// State shared between the application and reactor halves
struct ChannelShared {
    /// Identifier, unique within the owning server or client
    unit_id: String,

    /// Remote end of the connection
    peer_addr: SocketAddr,

    terminator: Terminator,

    /// Reactor token of the socket
    token: Token,

    /// True from connect/accept until close; never set again afterwards
    connected: AtomicBool,

    /// Set by the first close request
    closing: AtomicBool,

    /// Outbound bytes not yet written; the mutex is the send lock
    outbound: Mutex<BytesMut>,

    reactor: ReactorHandle,
}

/// Application-side handle to a byte-stream channel
#[derive(Clone)]
pub struct ChannelHandle {
    shared: Arc<ChannelShared>,
}

impl ChannelHandle {
    pub fn unit_id(&self) -> &str {
        &self.shared.unit_id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.shared.peer_addr
    }

    pub fn terminator(&self) -> &Terminator {
        &self.shared.terminator
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire) && !self.is_closing()
    }

    fn is_closing(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Queue `payload` for transmission
    ///
    /// With `append_terminator`, the terminator is added unless the payload
    /// already ends with it. The whole payload is queued under the send lock,
    /// so concurrent senders never interleave on the wire.
    pub fn send(&self, payload: &[u8], append_terminator: bool) -> Result<()> {
        let mut outbound = self.shared.outbound.lock();
        if !self.is_connected() {
            return Err(CommError::Transmission(format!(
                "channel {} is closed",
                self.shared.unit_id
            )));
        }

        if append_terminator {
            self.shared.terminator.seal(payload, &mut outbound);
        } else {
            outbound.extend_from_slice(payload);
        }

        tracing::trace!(
            "channel {} queued {} bytes ({} pending)",
            self.shared.unit_id,
            payload.len(),
            outbound.len()
        );
        self.shared.reactor.submit(Request::Notify(self.shared.token))
    }

    /// Send a string followed by the terminator
    pub fn send_str(&self, text: &str) -> Result<()> {
        self.send(text.as_bytes(), true)
    }

    /// Close the channel
    ///
    /// Safe to call any number of times; the owner sees exactly one
    /// disconnect. Pending outbound data queued before the call is flushed
    /// first, as far as the socket accepts it without blocking.
    pub fn close(&self) {
        if self.shared.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.shared.reactor.submit(Request::Close(self.shared.token)) {
            tracing::debug!("channel {} close not delivered: {}", self.shared.unit_id, e);
            self.shared.connected.store(false, Ordering::Release);
        }
    }

    /// Both handles refer to the same channel
    pub fn same_channel(&self, other: &ChannelHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("unit_id", &self.shared.unit_id)
            .field("peer_addr", &self.shared.peer_addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {} ({})", self.shared.unit_id, self.shared.peer_addr)
    }
}

/// Reactor-side half of a byte-stream channel
pub(crate) struct StreamChannel {
    stream: TcpStream,

    handle: ChannelHandle,

    /// Inbound buffer
    frames: FrameBuffer,

    /// Scratch space for socket reads
    read_buf: Vec<u8>,

    /// Owning collection, taken on close
    owner: Option<Arc<dyn LinkObserver>>,

    /// Receives framed messages
    handler: Arc<dyn Handler>,

    /// The connect event was delivered
    announced: bool,
}

impl StreamChannel {
    /// Wrap a connected socket
    ///
    /// The connect notification fires once the reactor registers the channel.
    pub(crate) fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        unit_id: String,
        terminator: Terminator,
        owner: Arc<dyn LinkObserver>,
        handler: Arc<dyn Handler>,
        reactor: &ReactorHandle,
        config: &Config,
    ) -> Result<(Self, ChannelHandle)> {
        stream.set_nodelay(config.nodelay)?;

        let shared = Arc::new(ChannelShared {
            unit_id,
            peer_addr,
            terminator: terminator.clone(),
            token: reactor.next_token(),
            connected: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            outbound: Mutex::new(BytesMut::new()),
            reactor: reactor.clone(),
        });
        let handle = ChannelHandle { shared };

        let channel = Self {
            stream,
            handle: handle.clone(),
            frames: FrameBuffer::new(terminator),
            read_buf: vec![0; config.read_chunk_size],
            owner: Some(owner),
            handler,
            announced: false,
        };
        Ok((channel, handle))
    }

    pub(crate) fn token(&self) -> Token {
        self.handle.shared.token
    }

    /// Append received bytes and deliver every completed message
    fn on_data_received(&mut self, len: usize) {
        self.frames.extend(&self.read_buf[..len]);
        while let Some(message) = self.frames.next_frame() {
            tracing::trace!(
                "channel {} received {} byte message",
                self.handle.unit_id(),
                message.len()
            );
            let handler = &self.handler;
            let handle = &self.handle;
            guard("on_message", || handler.on_message(handle, message));
        }
    }

    /// Write queued bytes until done or the socket would block
    fn flush(&mut self) -> Disposition {
        let mut outbound = self.handle.shared.outbound.lock();
        while !outbound.is_empty() {
            match self.stream.write(&outbound) {
                Ok(0) => {
                    tracing::debug!("channel {} wrote zero bytes", self.handle.unit_id());
                    return Disposition::Close;
                }
                Ok(n) => outbound.advance(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("channel {} write failed: {}", self.handle.unit_id(), e);
                    return Disposition::Close;
                }
            }
        }
        Disposition::Keep
    }
}

impl Source for StreamChannel {
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(
            &mut self.stream,
            token,
            Interest::READABLE | Interest::WRITABLE,
        )
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut self.stream)
    }

    fn on_registered(&mut self, _cx: &mut Context<'_>) -> Disposition {
        tracing::debug!("{} connected", self.handle);
        self.announced = true;
        if let Some(owner) = &self.owner {
            owner.link_event(&self.handle, LinkEvent::Connected);
        }
        Disposition::Keep
    }

    fn on_readable(&mut self, _cx: &mut Context<'_>) -> Disposition {
        loop {
            match self.stream.read(&mut self.read_buf) {
                Ok(0) => {
                    tracing::debug!("{} closed by peer", self.handle);
                    return Disposition::Close;
                }
                Ok(n) => self.on_data_received(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("{} read failed: {}", self.handle, e);
                    return Disposition::Close;
                }
            }
        }
        Disposition::Keep
    }

    fn on_writable(&mut self, _cx: &mut Context<'_>) -> Disposition {
        self.flush()
    }

    fn on_closed(&mut self) {
        let shared = Arc::clone(&self.handle.shared);
        shared.closing.store(true, Ordering::Release);

        // Best effort: whatever was queued before close gets one last chance.
        if let Disposition::Close = self.flush() {
            tracing::trace!("{} dropped unsent data on close", self.handle);
        }

        if let Some(owner) = self.owner.take() {
            if self.announced && shared.connected.load(Ordering::Acquire) {
                owner.link_event(&self.handle, LinkEvent::Disconnected);
            }
            owner.released(&self.handle);
        }

        shared.connected.store(false, Ordering::Release);
        shared.outbound.lock().clear();
        self.frames.clear();

        if let Err(e) = self.stream.shutdown(std::net::Shutdown::Both) {
            tracing::trace!("{} shutdown: {}", self.handle, e);
        }
        tracing::debug!("{} closed", self.handle);
    }

    fn describe(&self) -> String {
        self.handle.to_string()
    }
}
