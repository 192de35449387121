//! Client Collection
//!
//! Owns exactly one outbound stream channel.

use std::net::{SocketAddr, TcpStream as StdTcpStream};
use std::sync::Arc;

use mio::net::TcpStream;
use parking_lot::Mutex;

use super::channel::StreamChannel;
use super::handler::{guard, Handler, LinkEvent, LinkObserver};
use super::ChannelHandle;
use crate::config::Config;
use crate::error::{CommError, Result};
use crate::framing::Terminator;
use crate::reactor::{ReactorHandle, Request};

/// Forwards the channel's lifecycle events to the application
struct ClientObserver {
    handler: Arc<dyn Handler>,
}

impl LinkObserver for ClientObserver {
    fn link_event(&self, channel: &ChannelHandle, event: LinkEvent) {
        guard("client event callback", || self.handler.on_event(channel, event));
    }
}

/// TCP client with a single terminator-framed channel
pub struct CommClient {
    addr: SocketAddr,
    channel: Mutex<Option<ChannelHandle>>,
}

impl CommClient {
    /// Connect to `addr` and register the channel with the reactor
    ///
    /// The attempt is bounded by `config.connect_timeout`. On failure no
    /// channel exists and the error is returned.
    pub fn connect(
        reactor: &ReactorHandle,
        addr: SocketAddr,
        terminator: Terminator,
        unit_id: impl Into<String>,
        handler: Arc<dyn Handler>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;
        let unit_id = unit_id.into();

        let stream = StdTcpStream::connect_timeout(&addr, config.connect_timeout)
            .map_err(|e| CommError::connection(&format!("connect to {}", addr), e))?;
        stream.set_nonblocking(true)?;

        let observer = Arc::new(ClientObserver {
            handler: Arc::clone(&handler),
        });
        let (channel, handle) = StreamChannel::new(
            TcpStream::from_std(stream),
            addr,
            unit_id,
            terminator,
            observer,
            handler,
            reactor,
            config,
        )?;

        reactor.submit(Request::Register {
            token: channel.token(),
            source: Box::new(channel),
        })?;

        tracing::debug!("client {} connecting to {}", handle.unit_id(), addr);

        Ok(Self {
            addr,
            channel: Mutex::new(Some(handle)),
        })
    }

    /// Remote address this client was created for
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The channel, until `stop` is called
    pub fn channel(&self) -> Option<ChannelHandle> {
        self.channel.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.channel
            .lock()
            .as_ref()
            .is_some_and(ChannelHandle::is_connected)
    }

    pub fn send(&self, payload: &[u8], append_terminator: bool) -> Result<()> {
        match self.channel() {
            Some(channel) => channel.send(payload, append_terminator),
            None => Err(CommError::Transmission(format!(
                "client for {} is stopped",
                self.addr
            ))),
        }
    }

    pub fn send_str(&self, text: &str) -> Result<()> {
        self.send(text.as_bytes(), true)
    }

    /// Close the channel and forget it; safe to call when already stopped
    pub fn stop(&self) {
        if let Some(channel) = self.channel.lock().take() {
            channel.close();
        }
    }
}

impl Drop for CommClient {
    fn drop(&mut self) {
        self.stop();
    }
}
