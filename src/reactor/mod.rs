//! Reactor Module
//!
//! The single dispatch loop every socket in the crate is driven by.
//!
//! ## Architecture
//! ```text
//!   application threads                       reactor thread
//!  ┌─────────────────────┐   Request    ┌──────────────────────────────┐
//!  │ ReactorHandle       │─────────────▶│ crossbeam Receiver           │
//!  │ (send/close/stop)   │   + Waker    │        │                     │
//!  └─────────────────────┘              │        ▼                     │
//!                                       │ mio::Poll ──▶ Source handlers │
//!                                       │  (readable/writable/closed)  │
//!                                       └──────────────────────────────┘
//! ```
//!
//! - Only the reactor thread touches registered sockets
//! - Other threads hand work over as requests and wake the poll
//! - Handlers run one at a time; a slow handler stalls every socket

mod event_loop;
mod handle;
mod source;

pub use event_loop::Reactor;
pub use handle::ReactorHandle;

pub(crate) use handle::Request;
pub(crate) use source::{Context, Disposition, Source};
