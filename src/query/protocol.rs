//! Wire format of the companion store.
//!
//! A request is a single text message; the reply is a single text message
//! whose first space-delimited token is the status (`ok`, `err`, ...) and
//! whose remainder is an optional payload.

use crate::config::Framing;
use std::io::{self, BufRead, Read, Write};

/// Status token of a successful reply.
pub const STATUS_OK: &str = "ok";

/// Status token of replies synthesized for transport faults.
pub const STATUS_ERR: &str = "err";

const HEADER_LEN: usize = 4;

/// A reply from the companion store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    raw: String,
}

impl QueryResponse {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Reply standing in for a transport fault.
    pub fn error(reason: impl std::fmt::Display) -> Self {
        Self {
            raw: format!("{STATUS_ERR} {reason}"),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Text up to the first space, or the whole reply.
    pub fn status(&self) -> &str {
        self.raw
            .split_once(' ')
            .map_or(self.raw.as_str(), |(status, _)| status)
    }

    /// Text after the first space, if there is one.
    pub fn payload(&self) -> Option<&str> {
        self.raw.split_once(' ').map(|(_, payload)| payload)
    }

    /// Exact, case-sensitive comparison of the status with `ok`.
    pub fn is_ok(&self) -> bool {
        self.status() == STATUS_OK
    }
}

/// Write one framed message.
pub fn write_frame<W: Write>(writer: &mut W, framing: Framing, message: &str) -> io::Result<()> {
    match framing {
        Framing::LengthPrefixed => {
            let len = u32::try_from(message.len()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "message too large for frame header")
            })?;
            let mut buffer = Vec::with_capacity(HEADER_LEN + message.len());
            buffer.extend_from_slice(&len.to_le_bytes());
            buffer.extend_from_slice(message.as_bytes());
            writer.write_all(&buffer)?;
        }
        Framing::Newline => {
            if message.contains('\n') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "message contains a newline",
                ));
            }
            let mut buffer = Vec::with_capacity(message.len() + 1);
            buffer.extend_from_slice(message.as_bytes());
            buffer.push(b'\n');
            writer.write_all(&buffer)?;
        }
    }
    writer.flush()
}

/// Read one framed message of at most `max_len` bytes.
///
/// A stream that ends before a complete frame arrives is an
/// `UnexpectedEof` error.
pub fn read_frame<R: BufRead>(reader: &mut R, framing: Framing, max_len: usize) -> io::Result<String> {
    let bytes = match framing {
        Framing::LengthPrefixed => {
            let mut header = [0u8; HEADER_LEN];
            reader.read_exact(&mut header)?;
            let len = u32::from_le_bytes(header) as usize;
            if len > max_len {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame of {len} bytes exceeds limit of {max_len}"),
                ));
            }
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload)?;
            payload
        }
        Framing::Newline => {
            let mut line = Vec::new();
            let limit = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
            (&mut *reader).take(limit).read_until(b'\n', &mut line)?;
            match line.last() {
                Some(b'\n') => {
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                }
                _ if line.len() as u64 >= limit => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("line exceeds limit of {max_len} bytes"),
                    ))
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed before end of line",
                    ))
                }
            }
            line
        }
    };

    String::from_utf8(bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "response is not valid UTF-8"))
}
