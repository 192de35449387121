//! Listening Dispatcher
//!
//! Accepts inbound connections and turns each into a stream channel.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Registry, Token};

use super::channel::StreamChannel;
use super::server::ServerShared;
use crate::config::Config;
use crate::framing::Terminator;
use crate::reactor::{Context, Disposition, Source};

pub(crate) struct Dispatcher {
    listener: TcpListener,
    local_addr: SocketAddr,
    server: Arc<ServerShared>,
    terminator: Terminator,
    config: Config,

    /// Accepted connections so far; the next unit id is `id_count + 1`
    id_count: u64,
}

impl Dispatcher {
    pub(crate) fn new(
        listener: TcpListener,
        local_addr: SocketAddr,
        server: Arc<ServerShared>,
        terminator: Terminator,
        config: Config,
    ) -> Self {
        Self {
            listener,
            local_addr,
            server,
            terminator,
            config,
            id_count: 0,
        }
    }

    /// Turn one accepted socket into a tracked channel
    fn admit(&mut self, cx: &mut Context<'_>, stream: TcpStream, peer: SocketAddr) {
        if self.server.connection_count() >= self.config.max_connections {
            tracing::warn!(
                "refusing {} on {}: {} connections already open",
                peer,
                self.local_addr,
                self.config.max_connections
            );
            drop(stream);
            return;
        }

        self.id_count += 1;
        let unit_id = self.id_count.to_string();

        let owner = Arc::clone(&self.server);
        match StreamChannel::new(
            stream,
            peer,
            unit_id,
            self.terminator.clone(),
            owner,
            self.server.handler(),
            cx.handle(),
            &self.config,
        ) {
            Ok((channel, handle)) => {
                tracing::debug!("accepted {} on {}", handle, self.local_addr);
                self.server.track(handle);
                cx.register(channel.token(), Box::new(channel));
            }
            Err(e) => {
                tracing::warn!("failed to set up channel for {}: {}", peer, e);
            }
        }
    }
}

impl Source for Dispatcher {
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.listener, token, Interest::READABLE)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut self.listener)
    }

    fn on_readable(&mut self, cx: &mut Context<'_>) -> Disposition {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(cx, stream, peer),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // One failed accept never tears down the listener.
                    tracing::warn!("accept failed on {}: {}", self.local_addr, e);
                    break;
                }
            }
        }
        Disposition::Keep
    }

    fn on_error(&mut self, _cx: &mut Context<'_>) -> Disposition {
        // The listener stays registered; only the pending error is consumed.
        match self.listener.take_error() {
            Ok(Some(e)) => tracing::warn!("listener {} reported error: {}", self.local_addr, e),
            Ok(None) => tracing::debug!("listener {} spurious error event", self.local_addr),
            Err(e) => tracing::warn!("listener {} error unreadable: {}", self.local_addr, e),
        }
        Disposition::Keep
    }

    fn on_closed(&mut self) {
        tracing::info!("listener on {} closed", self.local_addr);
    }

    fn describe(&self) -> String {
        format!("listener {}", self.local_addr)
    }
}
