//! # commlink
//!
//! A small connection framework for TCP and UDP built on one poll loop:
//! - Terminator-delimited message framing over TCP
//! - Servers that track their accepted channels, clients with one channel
//! - One-directional UDP receivers and senders
//! - Application callbacks isolated from the loop (errors and panics dropped)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Application (Handler impl)                  │
//! └───────────┬─────────────────────────────────▲───────────────┘
//!             │ send / stop                     │ on_event / on_message
//! ┌───────────▼────────────┐        ┌───────────┴───────────────┐
//! │ CommServer / CommClient│        │   Byte-Stream Channels    │
//! │  (channel bookkeeping) │◀───────│ (framing, send lock)      │
//! └───────────┬────────────┘        └───────────▲───────────────┘
//!             │ register                        │ readiness
//! ┌───────────▼─────────────────────────────────┴───────────────┐
//! │                Reactor (mio::Poll, one thread)              │
//! │      Dispatcher · Channels · DatagramReceiver/Sender        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use commlink::{CommServer, Config, FnHandler, Reactor, Terminator};
//!
//! # fn main() -> commlink::Result<()> {
//! let config = Config::default();
//! let (reactor, _join) = Reactor::start(&config)?;
//!
//! let handler = FnHandler::new().on_message(|channel, message| {
//!     channel.send(&message, true)?;
//!     Ok(())
//! });
//! let server = CommServer::bind(
//!     &reactor,
//!     "127.0.0.1:9000".parse().unwrap(),
//!     Terminator::line(),
//!     Arc::new(handler),
//!     &config,
//! )?;
//! # drop(server);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod framing;
pub mod reactor;
pub mod network;
pub mod udp;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CallbackError, CallbackResult, CommError, Result};
pub use config::Config;
pub use framing::Terminator;
pub use network::{ChannelHandle, CommClient, CommServer, FnHandler, Handler, LinkEvent};
pub use reactor::{Reactor, ReactorHandle};
pub use udp::{DatagramCallback, DatagramReceiver, DatagramSender};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of commlink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
