//! Frame buffer
//!
//! Accumulates inbound bytes and splits them on the terminator.

use bytes::{Buf, Bytes, BytesMut};

use super::Terminator;

/// Inbound buffer of a byte-stream channel
///
/// Data can arrive in chunks of any size; `next_frame` only yields a message
/// once its terminator has been fully received.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Message delimiter
    terminator: Terminator,

    /// Bytes received but not yet delivered
    buf: BytesMut,

    /// Offset up to which `buf` is known not to contain a terminator start
    scanned: usize,
}

impl FrameBuffer {
    pub fn new(terminator: Terminator) -> Self {
        Self {
            terminator,
            buf: BytesMut::new(),
            scanned: 0,
        }
    }

    /// Append a received chunk
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete message, if one is buffered
    ///
    /// The message and its terminator are removed from the buffer. Any bytes
    /// following the terminator stay buffered for the next call.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        let terminator = match self.terminator.as_bytes() {
            Some(t) => t,
            None => {
                if self.buf.is_empty() {
                    return None;
                }
                return Some(self.buf.split().freeze());
            }
        };

        let term_len = terminator.len();
        if self.buf.len() < term_len {
            return None;
        }

        let found = self.buf[self.scanned..]
            .windows(term_len)
            .position(|w| w == terminator)
            .map(|pos| self.scanned + pos);

        match found {
            Some(end) => {
                let message = self.buf.split_to(end).freeze();
                self.buf.advance(term_len);
                self.scanned = 0;
                Some(message)
            }
            None => {
                // A terminator may straddle this chunk and the next one.
                self.scanned = self.buf.len() + 1 - term_len;
                None
            }
        }
    }

    /// Number of bytes waiting for a terminator
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    /// Drop any partial message
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }
}
