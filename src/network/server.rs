//! Server Collection
//!
//! Owns the listening dispatcher and the set of connected channels.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use mio::net::TcpListener;
use mio::Token;
use parking_lot::Mutex;

use super::dispatcher::Dispatcher;
use super::handler::{guard, Handler, LinkEvent, LinkObserver};
use super::ChannelHandle;
use crate::config::Config;
use crate::error::{CommError, Result};
use crate::framing::Terminator;
use crate::reactor::{ReactorHandle, Request};

/// Server state reachable from the reactor thread
pub(crate) struct ServerShared {
    handler: Arc<dyn Handler>,

    /// Connected channels keyed by unit id
    channels: Mutex<HashMap<String, ChannelHandle>>,
}

impl ServerShared {
    pub(crate) fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }

    pub(crate) fn track(&self, channel: ChannelHandle) {
        self.channels
            .lock()
            .insert(channel.unit_id().to_string(), channel);
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.channels.lock().len()
    }
}

impl LinkObserver for ServerShared {
    fn link_event(&self, channel: &ChannelHandle, event: LinkEvent) {
        guard("server event callback", || self.handler.on_event(channel, event));
    }

    fn released(&self, channel: &ChannelHandle) {
        let mut channels = self.channels.lock();
        match channels.get(channel.unit_id()) {
            Some(tracked) if tracked.same_channel(channel) => {
                channels.remove(channel.unit_id());
            }
            _ => tracing::trace!("{} was not tracked", channel),
        }
    }
}

/// TCP server accepting terminator-framed channels
///
/// Accepted channels get unit ids `"1"`, `"2"`, ... in accept order.
pub struct CommServer {
    shared: Arc<ServerShared>,
    local_addr: SocketAddr,
    dispatcher: Token,
    reactor: ReactorHandle,
}

impl CommServer {
    /// Bind `addr` and start accepting on the reactor
    pub fn bind(
        reactor: &ReactorHandle,
        addr: SocketAddr,
        terminator: Terminator,
        handler: Arc<dyn Handler>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;

        // std sets SO_REUSEADDR on unix listeners.
        let listener = StdTcpListener::bind(addr)
            .map_err(|e| CommError::connection(&format!("bind {}", addr), e))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let shared = Arc::new(ServerShared::new(handler));

        let dispatcher = Dispatcher::new(
            TcpListener::from_std(listener),
            local_addr,
            Arc::clone(&shared),
            terminator,
            config.clone(),
        );
        let token = reactor.next_token();
        reactor.submit(Request::Register {
            token,
            source: Box::new(dispatcher),
        })?;

        tracing::info!("server listening on {}", local_addr);

        Ok(Self {
            shared,
            local_addr,
            dispatcher: token,
            reactor: reactor.clone(),
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn channel(&self, unit_id: &str) -> Option<ChannelHandle> {
        self.shared.channels.lock().get(unit_id).cloned()
    }

    /// Snapshot of the connected channels
    pub fn channels(&self) -> Vec<ChannelHandle> {
        self.shared.channels.lock().values().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.shared.connection_count()
    }

    /// Send `payload` to every connected channel
    ///
    /// Returns how many channels accepted it.
    pub fn broadcast(&self, payload: &[u8], append_terminator: bool) -> usize {
        self.channels()
            .iter()
            .filter(|channel| match channel.send(payload, append_terminator) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("broadcast skipped {}: {}", channel, e);
                    false
                }
            })
            .count()
    }

    /// Close every connected channel; the server keeps listening
    ///
    /// Each channel stays tracked until its disconnect callback has run, so
    /// the set empties asynchronously. If the reactor is gone no callback
    /// will come and the set is cleared here.
    pub fn stop(&self) {
        for channel in self.channels() {
            channel.close();
        }
        if self.reactor.is_shut_down() {
            self.shared.channels.lock().clear();
        }
    }
}

impl Drop for CommServer {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.reactor.submit(Request::Close(self.dispatcher)) {
            tracing::debug!("listener {} not closed: {}", self.local_addr, e);
        }
    }
}
