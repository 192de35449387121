//! UDP Module
//!
//! One-directional datagram endpoints driven by the reactor.
//!
//! - [`DatagramReceiver`]: bound socket, hands each datagram to a callback
//! - [`DatagramSender`]: single-slot sender, newest payload wins

mod receiver;
mod sender;

pub use receiver::{DatagramCallback, DatagramReceiver};
pub use sender::DatagramSender;
