//! Port traits: the hexagonal boundary between the relay and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Relay (domain)
//! ```
//!
//! Driven adapters (UART, WebSocket client, HTTP client, clock, NVS) implement
//! these traits.  The [`Relay`](super::service::Relay) consumes them via
//! generics, so the domain core never touches a peripheral directly and every
//! test builds its own isolated set of ports.
//!
//! All ports used inside the relay loop must return within a bounded time:
//! a blocking port starves the peer drain.

use core::fmt;

use crate::config::BridgeConfig;

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.  Injected so timers are deterministic in tests.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Peer link port (serial link to the K210)
// ───────────────────────────────────────────────────────────────

pub trait PeerLinkPort {
    /// Read whatever bytes are buffered, up to `buf.len()`.
    /// Returns `Ok(0)` when nothing is available (never blocks).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Queue one complete, newline-terminated line for transmission.
    /// Either the whole line is accepted or none of it is.
    fn write_line(&mut self, line: &str) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Control transport port (persistent backend connection)
// ───────────────────────────────────────────────────────────────

/// Maximum size of one inbound control frame.
pub const CONTROL_FRAME_CAP: usize = 1024;

/// Something that happened on the control connection since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Connected,
    Disconnected,
    Text(heapless::String<CONTROL_FRAME_CAP>),
}

pub trait ControlTransport {
    /// Begin connecting to `path` on the configured backend.  Completion is
    /// signalled later by [`ControlEvent::Connected`].
    fn open(&mut self, path: &str) -> Result<(), ChannelError>;

    /// Tear down the current connection attempt, if any.
    fn close(&mut self);

    /// Next pending event, or `None` if nothing arrived.
    fn poll_event(&mut self) -> Option<ControlEvent>;
}

// ───────────────────────────────────────────────────────────────
// Backend port (request/response event delivery)
// ───────────────────────────────────────────────────────────────

pub trait BackendPort {
    /// POST a JSON `body` to `endpoint` (e.g. `/api/message`).
    ///
    /// Returns the HTTP status when any response arrived.  Implementations
    /// refuse with [`DeliveryError::NotAssociated`] when the network is down
    /// and must honour their own request timeout.
    fn post(&mut self, endpoint: &str, body: &str) -> Result<u16, DeliveryError>;
}

/// Liveness signal for whatever supervises the relay task.
///
/// Fed before every blocking backend request, so the supervisor's window
/// only has to cover one request timeout rather than a whole iteration.
pub trait KeepAlive {
    fn feed(&self);
}

impl<T: KeepAlive + ?Sized> KeepAlive for &T {
    fn feed(&self) {
        (**self).feed();
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / diagnostics)
// ───────────────────────────────────────────────────────────────

/// The relay emits structured [`BridgeEvent`](super::events::BridgeEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::BridgeEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists bridge configuration.
///
/// Implementations MUST validate before persisting and reject out-of-range
/// values with [`ConfigError::ValidationFailed`].
pub trait ConfigPort {
    /// Returns [`BridgeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<BridgeConfig, ConfigError>;

    fn save(&self, config: &BridgeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the relay)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the [`Scheduler`](crate::scheduler::Scheduler)
/// invokes when an interval timer elapses.
pub trait SchedulerDelegate {
    fn on_timer_fired(&mut self, timer: TimerId);
}

/// The relay's periodic timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    /// Query the peer with `system_status`.
    StatusPoll,
    /// Post the heartbeat to the backend.
    Heartbeat,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The UART driver rejected the operation.
    Io,
    /// The TX buffer could not take the whole line.
    WouldBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The client could not be created or the connect call failed.
    OpenFailed,
    /// The connection dropped or never completed.
    Disconnected,
    /// A `Connecting` attempt exceeded its deadline.
    ConnectTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The WiFi station is not associated; nothing was sent.
    NotAssociated,
    /// The HTTP connection could not be established.
    Connect,
    /// The request or response failed mid-flight.
    Io,
    /// The request exceeded its timeout.
    Timeout,
    /// A response arrived with a non-2xx status.
    Status(u16),
}

#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "UART I/O error"),
            Self::WouldBlock => write!(f, "TX buffer full"),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed => write!(f, "open failed"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::ConnectTimeout => write!(f, "connect timed out"),
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAssociated => write!(f, "network not associated"),
            Self::Connect => write!(f, "connect failed"),
            Self::Io => write!(f, "I/O error"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Status(code) => write!(f, "HTTP {code}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
