//! Application handlers
//!
//! How the core talks back to the application: lifecycle events and framed
//! messages. Callback failures never cross back into the reactor.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;

use super::ChannelHandle;
use crate::error::{CallbackResult, CommError};

/// Lifecycle transition of a stream channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkEvent {
    /// The channel finished connecting (client) or was accepted (server)
    Connected,

    /// The channel was closed, locally or by the peer
    Disconnected,
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Connected => f.write_str("connect"),
            LinkEvent::Disconnected => f.write_str("disconnect"),
        }
    }
}

/// Application callbacks for servers and clients
///
/// Both methods run on the reactor thread. A handler that blocks stalls
/// every socket the reactor drives, so hand long work to another thread.
/// Returned errors (and panics) are logged and dropped.
pub trait Handler: Send + Sync + 'static {
    /// A channel connected or disconnected
    fn on_event(&self, _channel: &ChannelHandle, _event: LinkEvent) -> CallbackResult {
        Ok(())
    }

    /// A complete message arrived (terminator stripped)
    fn on_message(&self, _channel: &ChannelHandle, _message: Bytes) -> CallbackResult {
        Ok(())
    }
}

type EventFn = Box<dyn Fn(&ChannelHandle, LinkEvent) -> CallbackResult + Send + Sync>;
type MessageFn = Box<dyn Fn(&ChannelHandle, Bytes) -> CallbackResult + Send + Sync>;

/// [`Handler`] built from closures
///
/// ```rust,no_run
/// use commlink::network::FnHandler;
///
/// let handler = FnHandler::new()
///     .on_event(|channel, event| {
///         println!("{} {}", channel.unit_id(), event);
///         Ok(())
///     })
///     .on_message(|channel, message| {
///         channel.send(&message, true)?;
///         Ok(())
///     });
/// ```
#[derive(Default)]
pub struct FnHandler {
    on_event: Option<EventFn>,
    on_message: Option<MessageFn>,
}

impl FnHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ChannelHandle, LinkEvent) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_event = Some(Box::new(f));
        self
    }

    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&ChannelHandle, Bytes) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_message = Some(Box::new(f));
        self
    }
}

impl Handler for FnHandler {
    fn on_event(&self, channel: &ChannelHandle, event: LinkEvent) -> CallbackResult {
        match &self.on_event {
            Some(f) => f(channel, event),
            None => Ok(()),
        }
    }

    fn on_message(&self, channel: &ChannelHandle, message: Bytes) -> CallbackResult {
        match &self.on_message {
            Some(f) => f(channel, message),
            None => Ok(()),
        }
    }
}

/// Run an application callback, turning errors and panics into `CommError`
pub(crate) fn invoke<F>(what: &str, f: F) -> Result<(), CommError>
where
    F: FnOnce() -> CallbackResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CommError::Callback(format!("{}: {}", what, e))),
        Err(_) => Err(CommError::Callback(format!("{} panicked", what))),
    }
}

/// Run an application callback and discard its failure
pub(crate) fn guard<F>(what: &str, f: F)
where
    F: FnOnce() -> CallbackResult,
{
    if let Err(e) = invoke(what, f) {
        tracing::debug!("discarding {}", e);
    }
}

/// Lifecycle sink a stream channel reports to (its owning collection)
///
/// The channel holds this until it closes, then drops it; it never reaches
/// into the collection's bookkeeping itself.
pub(crate) trait LinkObserver: Send + Sync {
    /// Forward a lifecycle event to the application
    fn link_event(&self, channel: &ChannelHandle, event: LinkEvent);

    /// The channel is gone; drop it from any bookkeeping
    fn released(&self, _channel: &ChannelHandle) {}
}
