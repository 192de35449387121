//! Reactor loop

use std::collections::HashMap;
use std::io;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, TryRecvError};
use mio::{Events, Poll, Token, Waker};

use super::{Context, Disposition, ReactorHandle, Request, Source};
use crate::config::Config;
use crate::error::Result;

const WAKER_TOKEN: Token = Token(0);

/// Readiness flags copied out of a mio event
#[derive(Debug, Clone, Copy)]
struct Readiness {
    token: Token,
    readable: bool,
    writable: bool,
    error: bool,
}

/// Single-threaded poll loop
///
/// Create with [`Reactor::new`], hand out [`Reactor::handle`] clones, then
/// either call [`Reactor::run`] on a dedicated thread or use [`Reactor::spawn`].
pub struct Reactor {
    poll: Poll,
    events: Events,
    requests: Receiver<Request>,
    sources: HashMap<Token, Box<dyn Source>>,
    handle: ReactorHandle,
}

impl Reactor {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;
        let (tx, rx) = channel::unbounded();

        Ok(Self {
            poll,
            events: Events::with_capacity(config.event_capacity),
            requests: rx,
            sources: HashMap::new(),
            handle: ReactorHandle::new(tx, waker),
        })
    }

    /// Create a reactor and run it on a background thread
    pub fn start(config: &Config) -> Result<(ReactorHandle, JoinHandle<Result<()>>)> {
        let reactor = Self::new(config)?;
        let handle = reactor.handle();
        let join = reactor.spawn()?;
        Ok((handle, join))
    }

    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Run this reactor on a new thread
    pub fn spawn(self) -> Result<JoinHandle<Result<()>>> {
        let join = thread::Builder::new()
            .name("commlink-reactor".to_string())
            .spawn(move || self.run())?;
        Ok(join)
    }

    /// Run the loop until [`ReactorHandle::shutdown`] is called
    pub fn run(mut self) -> Result<()> {
        tracing::debug!("reactor started");

        // Requests queued before the loop started (early registrations).
        let mut running = self.drain_requests();

        while running {
            if let Err(e) = self.poll.poll(&mut self.events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                tracing::error!("poll failed: {}", e);
                self.close_all();
                return Err(e.into());
            }

            let ready: Vec<Readiness> = self
                .events
                .iter()
                .filter(|event| event.token() != WAKER_TOKEN)
                .map(|event| Readiness {
                    token: event.token(),
                    readable: event.is_readable() || event.is_read_closed(),
                    writable: event.is_writable(),
                    error: event.is_error(),
                })
                .collect();

            for readiness in ready {
                self.handle_readiness(readiness);
            }

            running = self.drain_requests();
        }

        self.close_all();
        tracing::debug!("reactor stopped");
        Ok(())
    }

    fn handle_readiness(&mut self, readiness: Readiness) {
        let token = readiness.token;
        if readiness.error {
            self.dispatch(token, |source, cx| source.on_error(cx));
        }
        if readiness.readable {
            self.dispatch(token, |source, cx| source.on_readable(cx));
        }
        if readiness.writable {
            self.dispatch(token, |source, cx| source.on_writable(cx));
        }
    }

    /// Process queued requests; returns false once shutdown was requested
    fn drain_requests(&mut self) -> bool {
        loop {
            match self.requests.try_recv() {
                Ok(Request::Register { token, source }) => self.install(token, source),
                Ok(Request::Notify(token)) => {
                    self.dispatch(token, |source, cx| source.on_notify(cx));
                }
                Ok(Request::Close(token)) => {
                    if let Some(source) = self.sources.remove(&token) {
                        self.retire(source);
                    }
                }
                Ok(Request::Shutdown) => return false,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Run one handler on a source, then apply its disposition
    fn dispatch<F>(&mut self, token: Token, handler: F)
    where
        F: FnOnce(&mut dyn Source, &mut Context<'_>) -> Disposition,
    {
        let Some(mut source) = self.sources.remove(&token) else {
            return;
        };

        let mut pending = Vec::new();
        let disposition = {
            let mut cx = Context::new(&self.handle, &mut pending);
            handler(source.as_mut(), &mut cx)
        };

        match disposition {
            Disposition::Keep => {
                self.sources.insert(token, source);
            }
            Disposition::Close => self.retire(source),
        }

        for (token, source) in pending {
            self.install(token, source);
        }
    }

    fn install(&mut self, token: Token, mut source: Box<dyn Source>) {
        if let Err(e) = source.register(self.poll.registry(), token) {
            tracing::warn!("failed to register {}: {}", source.describe(), e);
            source.on_closed();
            return;
        }
        tracing::trace!("registered {} as token {}", source.describe(), token.0);
        self.sources.insert(token, source);
        self.dispatch(token, |source, cx| source.on_registered(cx));
    }

    fn retire(&mut self, mut source: Box<dyn Source>) {
        if let Err(e) = source.deregister(self.poll.registry()) {
            tracing::debug!("failed to deregister {}: {}", source.describe(), e);
        }
        source.on_closed();
    }

    fn close_all(&mut self) {
        self.handle.mark_shut_down();

        // Nothing can be queued past this point. Sources still waiting for
        // registration were never polled but must hear about the close.
        while let Ok(request) = self.requests.try_recv() {
            if let Request::Register { mut source, .. } = request {
                tracing::debug!("{} dropped before registration", source.describe());
                source.on_closed();
            }
        }

        let tokens: Vec<Token> = self.sources.keys().copied().collect();
        for token in tokens {
            if let Some(source) = self.sources.remove(&token) {
                self.retire(source);
            }
        }
    }
}
