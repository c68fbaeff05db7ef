//! Unified error types for the T-Bao bridge firmware.
//!
//! Nothing in the relay is ever escalated to process termination: every
//! failure is classified into one of the variants below, reported through
//! the [`EventSink`](crate::app::ports::EventSink) as
//! [`BridgeEvent::Fault`](crate::app::events::BridgeEvent::Fault), and
//! the loop carries on.
//!
//! | Variant        | Policy                                              |
//! |----------------|-----------------------------------------------------|
//! | `Parse`        | malformed line/frame: log and drop                  |
//! | `LinkTimeout`  | peer silent: downgrade `connected`, recover on startup |
//! | `Delivery`     | backend POST failed: log, no retry                  |
//! | `Channel`      | control channel dropped: reconnect after backoff    |
//! | `Link`         | serial write failed: directive stays queued         |

use core::fmt;

use crate::app::ports::{ChannelError, ConfigError, DeliveryError, LinkError};

/// Longest slice of offending input kept inside a [`ParseError`].
const MAX_ERROR_TEXT: usize = 128;

// ---------------------------------------------------------------------------
// Top-level bridge error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A serial line or control frame could not be decoded.
    Parse(ParseError),
    /// The peer has been silent longer than the health timeout.
    LinkTimeout { silent_ms: u64 },
    /// An outbound event could not be delivered to the backend.
    Delivery(DeliveryError),
    /// The backend control channel failed to open or dropped.
    Channel(ChannelError),
    /// The serial link to the peer rejected a write or read.
    Link(LinkError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::LinkTimeout { silent_ms } => write!(f, "peer silent for {silent_ms} ms"),
            Self::Delivery(e) => write!(f, "delivery: {e}"),
            Self::Channel(e) => write!(f, "control channel: {e}"),
            Self::Link(e) => write!(f, "serial link: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<DeliveryError> for Error {
    fn from(e: DeliveryError) -> Self {
        Self::Delivery(e)
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(match e {
            ConfigError::NotFound => "no stored config",
            ConfigError::Corrupted => "stored config corrupted",
            ConfigError::ValidationFailed(msg) => msg,
            ConfigError::IoError => "storage I/O error",
        })
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Not a JSON object.
    InvalidJson,
    /// A required field (e.g. `type`) is absent or not a string.
    MissingField(&'static str),
    /// The payload does not match the shape expected for its `type`.
    InvalidPayload,
    /// A control frame whose `type` is outside the command vocabulary.
    UnknownType,
    /// The serial line is not valid UTF-8.
    InvalidUtf8,
    /// The serial line exceeded the line buffer and was discarded.
    LineTooLong,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "invalid JSON"),
            Self::MissingField(name) => write!(f, "missing field '{name}'"),
            Self::InvalidPayload => write!(f, "invalid payload"),
            Self::UnknownType => write!(f, "unknown message type"),
            Self::InvalidUtf8 => write!(f, "invalid UTF-8"),
            Self::LineTooLong => write!(f, "line too long"),
        }
    }
}

/// A decode failure carrying the offending text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub text: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, text: &str) -> Self {
        let mut end = text.len().min(MAX_ERROR_TEXT);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            kind,
            text: text[..end].into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.kind, self.text)
    }
}
