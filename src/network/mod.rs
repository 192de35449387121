//! Network Module
//!
//! TCP servers, clients and the channels they own.
//!
//! ## Architecture
//! - One reactor thread drives every socket
//! - `CommServer` owns a listening dispatcher plus its accepted channels
//! - `CommClient` owns a single outbound channel
//! - Channels report lifecycle events and framed messages to a [`Handler`]

mod channel;
mod client;
mod dispatcher;
mod handler;
mod server;

pub use channel::ChannelHandle;
pub use client::CommClient;
pub use handler::{FnHandler, Handler, LinkEvent};
pub use server::CommServer;

pub(crate) use handler::guard;
