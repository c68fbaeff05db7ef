//! Outbound diagnostic observations.
//!
//! The [`Relay`](super::service::Relay) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log to the console, count them in tests.

use crate::error::Error;
use crate::wire::messages::PeerMode;

/// Structured events emitted by the relay core.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The relay has started (carries the device id it reports as).
    Started { device_id: String },

    // ── Peer link ─────────────────────────────────────────────
    /// A `startup` message arrived; the peer link is up.
    PeerConnected,
    /// A `status_response` refreshed the peer status.
    PeerStatus(PeerStatusSnapshot),
    /// The peer reported a face detection (detected or cleared).
    FaceDetection { detected: bool, count: u32 },
    /// An `image_analysis` result, diagnostics only.
    ImageAnalysis { brightness: i64 },
    /// An `audio_event` notification (raw payload).
    AudioEvent(String),
    /// The peer reported an internal fault.
    PeerFault(String),
    /// A directive was written to the serial link.
    DirectiveSent(&'static str),
    /// A directive was discarded because the pending queue was full.
    DirectiveDropped(&'static str),

    // ── Control channel ───────────────────────────────────────
    ControlConnecting,
    ControlConnected,
    /// An informational push from the backend (`kind` / `text`).
    ControlNotice { kind: String, text: String },

    // ── Event channel ─────────────────────────────────────────
    /// A report was accepted by the backend.
    Posted { endpoint: &'static str, status: u16 },

    /// A failure was logged and absorbed; the relay carries on.
    ///
    /// Control-channel drops, peer silence, failed posts and undecodable
    /// input all arrive here.
    Fault(Error),
}

/// A point-in-time copy of the peer status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStatusSnapshot {
    pub connected: bool,
    pub mode: PeerMode,
    pub face_detected: bool,
    pub audio_active: bool,
    pub last_message_at: u64,
}
