//! Framing Module
//!
//! Terminator-delimited message framing for byte streams.
//!
//! ## Frame Format
//! ```text
//! ┌─────────────────────────────┬──────────────┬─────────────────────
//! │          Message            │  Terminator  │  next message ...
//! └─────────────────────────────┴──────────────┴─────────────────────
//! ```
//!
//! The terminator is an arbitrary non-empty byte sequence chosen by the
//! application (commonly `\n` or `\r\n`). Messages never include it.
//! With no terminator, every received chunk is delivered as-is.

mod buffer;
mod terminator;

pub use buffer::FrameBuffer;
pub use terminator::Terminator;
