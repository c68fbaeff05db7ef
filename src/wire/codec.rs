//! Line-delimited JSON codec.
//!
//! Wire format (both directions, UTF-8):
//! ```text
//! {"type":"<string>","timestamp":<u64 ms>,"data":{...}}\n
//! ```
//!
//! [`LineDecoder`] accumulates incoming bytes and yields complete lines.
//! This handles partial reads gracefully: a single UART read may return
//! part of a line, exactly one line, or several lines concatenated.

use heapless::Vec;
use serde_json::Value;

use super::envelope::Envelope;
use crate::error::{ParseError, ParseErrorKind};

/// Maximum line length (protects against a peer that never sends `\n`).
pub const MAX_LINE_LEN: usize = 1024;

/// A single framing result from [`LineDecoder::feed`].
pub type LineResult<'a> = Result<&'a str, ParseError>;

/// Streaming newline framer.
pub struct LineDecoder {
    buf: Vec<u8, MAX_LINE_LEN>,
    /// Set once the current line overflowed; bytes are skipped until `\n`.
    discarding: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            discarding: false,
        }
    }

    /// Feed bytes into the decoder.
    ///
    /// `on_line` is invoked once per completed line, in arrival order.
    /// The terminating `\n` (and a preceding `\r`) is not included.  A
    /// trailing partial line stays buffered until the next call.
    pub fn feed(&mut self, data: &[u8], mut on_line: impl FnMut(LineResult<'_>)) {
        for &byte in data {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    on_line(Err(ParseError::new(
                        ParseErrorKind::LineTooLong,
                        &String::from_utf8_lossy(&self.buf),
                    )));
                } else {
                    let line = self.buf.strip_suffix(b"\r").unwrap_or(&self.buf);
                    match core::str::from_utf8(line) {
                        Ok(text) => on_line(Ok(text)),
                        Err(_) => on_line(Err(ParseError::new(
                            ParseErrorKind::InvalidUtf8,
                            &String::from_utf8_lossy(line),
                        ))),
                    }
                }
                self.buf.clear();
                continue;
            }

            if self.discarding {
                continue;
            }
            if self.buf.push(byte).is_err() {
                // Keep the head of the line for the error report.
                self.discarding = true;
            }
        }
    }

    /// Number of bytes of the current partial line.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial line (e.g. after the UART is reopened).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}

/// Encode an envelope into a newline-terminated line.
pub fn encode_line(kind: &str, data: Value, timestamp_ms: u64) -> String {
    let envelope = Envelope::new(kind, timestamp_ms, data);
    // Serialising a struct of String/u64/Value into a String cannot fail.
    let mut line = serde_json::to_string(&envelope).unwrap_or_default();
    line.push('\n');
    line
}

/// Decode one line into an [`Envelope`].
///
/// Surrounding whitespace is stripped first; an empty line is "no message"
/// (`Ok(None)`), not an error.
pub fn decode_line(line: &str) -> Result<Option<Envelope>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidJson, trimmed))?;
    if !value.is_object() {
        return Err(ParseError::new(ParseErrorKind::InvalidJson, trimmed));
    }
    if !value.get("type").is_some_and(Value::is_string) {
        return Err(ParseError::new(ParseErrorKind::MissingField("type"), trimmed));
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidPayload, trimmed))
}
