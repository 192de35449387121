//! Reactor handle
//!
//! Cloneable entry point used from any thread to reach the reactor.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;
use mio::{Token, Waker};
use parking_lot::RwLock;

use super::Source;
use crate::error::{CommError, Result};

/// Work handed from application threads to the reactor thread
pub(crate) enum Request {
    /// Register a new source under a pre-minted token
    Register { token: Token, source: Box<dyn Source> },

    /// Something changed on the application side (outbound data queued)
    Notify(Token),

    /// Close and drop a source
    Close(Token),

    /// Close every source and leave the loop
    Shutdown,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Register { token, .. } => write!(f, "Register({})", token.0),
            Request::Notify(token) => write!(f, "Notify({})", token.0),
            Request::Close(token) => write!(f, "Close({})", token.0),
            Request::Shutdown => write!(f, "Shutdown"),
        }
    }
}

struct HandleInner {
    requests: Sender<Request>,
    waker: Waker,
    next_token: AtomicUsize,

    /// Shut-down flag; submitters hold it shared while enqueueing so nothing
    /// lands in the queue behind `Shutdown`
    shut_down: RwLock<bool>,
}

/// Handle to a running (or not yet started) [`Reactor`](super::Reactor)
#[derive(Clone)]
pub struct ReactorHandle {
    inner: Arc<HandleInner>,
}

impl ReactorHandle {
    /// Token 0 belongs to the waker
    pub(crate) const FIRST_TOKEN: usize = 1;

    pub(crate) fn new(requests: Sender<Request>, waker: Waker) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                requests,
                waker,
                next_token: AtomicUsize::new(Self::FIRST_TOKEN),
                shut_down: RwLock::new(false),
            }),
        }
    }

    /// Mint a token for a new source
    pub(crate) fn next_token(&self) -> Token {
        Token(self.inner.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Queue a request for the reactor thread and wake it
    pub(crate) fn submit(&self, request: Request) -> Result<()> {
        {
            let shut_down = self.inner.shut_down.read();
            if *shut_down {
                return Err(CommError::ReactorClosed);
            }
            tracing::trace!("submitting {:?}", request);
            self.inner
                .requests
                .send(request)
                .map_err(|_| CommError::ReactorClosed)?;
        }
        self.inner.waker.wake()?;
        Ok(())
    }

    /// Ask the reactor to close every source and return from `run`
    ///
    /// Idempotent. Later requests fail with [`CommError::ReactorClosed`].
    pub fn shutdown(&self) {
        {
            let mut shut_down = self.inner.shut_down.write();
            if *shut_down {
                return;
            }
            *shut_down = true;
            if self.inner.requests.send(Request::Shutdown).is_err() {
                return;
            }
        }
        if let Err(e) = self.inner.waker.wake() {
            tracing::debug!("failed to wake reactor for shutdown: {}", e);
        }
    }

    /// Refuse further requests; everything submitted so far is queued
    pub(crate) fn mark_shut_down(&self) {
        *self.inner.shut_down.write() = true;
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shut_down.read()
    }
}

impl fmt::Debug for ReactorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorHandle")
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
