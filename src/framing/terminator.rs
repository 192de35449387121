//! Message terminator

use bytes::Bytes;

use crate::error::{CommError, Result};

/// Byte sequence that ends every message on a stream channel
///
/// `Terminator::none()` disables framing: each chunk read from the socket is
/// handed to the application unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Terminator(Option<Bytes>);

impl Terminator {
    /// Build a terminator from a non-empty byte sequence
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CommError::Config(
                "terminator must not be empty (use Terminator::none() to disable framing)".into(),
            ));
        }
        Ok(Self(Some(bytes)))
    }

    /// No framing
    pub fn none() -> Self {
        Self(None)
    }

    /// `\n`
    pub fn line() -> Self {
        Self(Some(Bytes::from_static(b"\n")))
    }

    /// `\r\n`
    pub fn crlf() -> Self {
        Self(Some(Bytes::from_static(b"\r\n")))
    }

    /// Parse a terminator written with `\n`, `\r`, `\t` and `\\` escapes
    ///
    /// Handy for terminators taken from the command line.
    pub fn from_escaped(raw: &str) -> Result<Self> {
        let mut out = Vec::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            let c = if c == '\\' {
                match chars.next() {
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('t') => '\t',
                    Some('\\') | None => '\\',
                    Some(other) => {
                        out.push(b'\\');
                        other
                    }
                }
            } else {
                c
            };
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        Self::new(out)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    /// Append the terminator to `out` unless `payload` already ends with it
    pub(crate) fn seal(&self, payload: &[u8], out: &mut bytes::BytesMut) {
        out.extend_from_slice(payload);
        if let Some(t) = &self.0 {
            if !payload.ends_with(t) {
                out.extend_from_slice(t);
            }
        }
    }
}
