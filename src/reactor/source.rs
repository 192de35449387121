//! Event sources
//!
//! Everything the reactor drives (stream channels, the listening dispatcher,
//! datagram endpoints) implements [`Source`].

use std::io;

use mio::{Registry, Token};

use super::ReactorHandle;

/// What the reactor should do with a source after a handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Keep,
    Close,
}

/// A socket owned by the reactor plus its readiness handlers
///
/// Handlers run on the reactor thread, one at a time.
pub(crate) trait Source: Send {
    /// Register the underlying socket with the poll registry
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()>;

    /// Remove the underlying socket from the poll registry
    fn deregister(&mut self, registry: &Registry) -> io::Result<()>;

    /// Called once, right after a successful registration
    fn on_registered(&mut self, _cx: &mut Context<'_>) -> Disposition {
        Disposition::Keep
    }

    /// The socket is readable (or the peer hung up)
    fn on_readable(&mut self, _cx: &mut Context<'_>) -> Disposition {
        Disposition::Keep
    }

    /// The socket is writable
    fn on_writable(&mut self, _cx: &mut Context<'_>) -> Disposition {
        Disposition::Keep
    }

    /// The poll reported an error condition on the socket
    fn on_error(&mut self, _cx: &mut Context<'_>) -> Disposition {
        tracing::debug!("socket error on {}", self.describe());
        Disposition::Close
    }

    /// The application queued work for this source
    fn on_notify(&mut self, cx: &mut Context<'_>) -> Disposition {
        self.on_writable(cx)
    }

    /// The source is being dropped: deregistered already, socket still open
    fn on_closed(&mut self);

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Access to the reactor from inside a handler
pub(crate) struct Context<'a> {
    handle: &'a ReactorHandle,
    pending: &'a mut Vec<(Token, Box<dyn Source>)>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        handle: &'a ReactorHandle,
        pending: &'a mut Vec<(Token, Box<dyn Source>)>,
    ) -> Self {
        Self { handle, pending }
    }

    pub(crate) fn handle(&self) -> &ReactorHandle {
        self.handle
    }

    /// Register a source once the current handler returns
    pub(crate) fn register(&mut self, token: Token, source: Box<dyn Source>) {
        self.pending.push((token, source));
    }
}
