//! Co-processor link state.
//!
//! [`PeerLink`] maintains [`PeerStatus`] from the stream of decoded inbound
//! envelopes and from elapsed time.  It never performs I/O: each handled
//! message yields a [`PeerReaction`] that the relay carries out.
//!
//! ```text
//!                 startup                 silence > timeout
//!   ┌──────────────┐ ──────▶ ┌───────────┐ ───────────────▶ ┌──────────────┐
//!   │ disconnected │         │ connected │                  │ disconnected │
//!   └──────────────┘ ◀────── └───────────┘                  └──────────────┘
//!                  (only via timeout)          ◀── startup ──┘
//! ```

use log::{debug, info, warn};

use super::events::PeerStatusSnapshot;
use crate::wire::envelope::Envelope;
use crate::wire::messages::{Directive, PeerMessage, PeerMode};
use crate::error::ParseError;

/// Mode the peer is switched into when it announces itself.
pub const FIRST_LIGHT_MODE: &str = "face_detection";

/// Connection, mode and detection status of the K210.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerStatus {
    pub connected: bool,
    pub mode: PeerMode,
    pub face_detected: bool,
    pub audio_active: bool,
    /// Bridge-clock time of the last successfully decoded message.
    pub last_message_at: u64,
}

/// What the relay must do after a peer message was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerReaction {
    None,
    /// Send this directive to the peer.
    Directive(Directive),
    /// Forward a face event with this count to the backend.
    ReportFace { count: u32 },
}

/// Peer link supervisor.
pub struct PeerLink {
    status: PeerStatus,
    health_timeout_ms: u64,
}

impl PeerLink {
    /// `now_ms` seeds `last_message_at` so the first health check measures
    /// silence from boot.
    pub fn new(health_timeout_ms: u64, now_ms: u64) -> Self {
        Self {
            status: PeerStatus {
                last_message_at: now_ms,
                ..PeerStatus::default()
            },
            health_timeout_ms,
        }
    }

    pub fn status(&self) -> &PeerStatus {
        &self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status.connected
    }

    pub fn snapshot(&self) -> PeerStatusSnapshot {
        PeerStatusSnapshot {
            connected: self.status.connected,
            mode: self.status.mode.clone(),
            face_detected: self.status.face_detected,
            audio_active: self.status.audio_active,
            last_message_at: self.status.last_message_at,
        }
    }

    /// Count a JSON object that never became an envelope as peer activity.
    pub fn touch(&mut self, now_ms: u64) {
        self.status.last_message_at = now_ms;
    }

    /// Apply one decoded envelope.
    ///
    /// Every envelope refreshes `last_message_at`, even when its payload
    /// turns out to be malformed; in that case the payload error is returned
    /// and no other field changes.
    pub fn handle(&mut self, envelope: Envelope, now_ms: u64) -> Result<(PeerMessage, PeerReaction), ParseError> {
        self.status.last_message_at = now_ms;

        let message = PeerMessage::from_envelope(envelope)?;
        let reaction = self.apply(&message);
        Ok((message, reaction))
    }

    fn apply(&mut self, message: &PeerMessage) -> PeerReaction {
        match message {
            PeerMessage::Startup(info) => {
                self.status.connected = true;
                info!(
                    "Peer: AI engine connected and ready (status={:?}, capabilities={:?})",
                    info.status, info.capabilities
                );
                PeerReaction::Directive(Directive::set_mode(FIRST_LIGHT_MODE))
            }
            PeerMessage::FaceDetection(face) => {
                self.status.face_detected = face.detected;
                if face.detected {
                    info!("Peer: face detected, count={}", face.count);
                    PeerReaction::ReportFace { count: face.count }
                } else {
                    debug!("Peer: faces cleared");
                    PeerReaction::None
                }
            }
            PeerMessage::ImageAnalysis(analysis) => {
                info!("Peer: image analysis, brightness={}", analysis.brightness);
                PeerReaction::None
            }
            PeerMessage::StatusResponse(report) => {
                self.status.mode = report.mode.clone();
                self.status.face_detected = report.face_detected;
                self.status.audio_active = report.audio_active;
                info!(
                    "Peer: status mode={} face={} audio={}",
                    self.status.mode.as_str(),
                    self.status.face_detected,
                    self.status.audio_active
                );
                PeerReaction::None
            }
            PeerMessage::AudioEvent(_) => PeerReaction::None,
            PeerMessage::Error { message } => {
                warn!("Peer: reported error: {}", message);
                PeerReaction::None
            }
            PeerMessage::Unrecognized(kind) => {
                debug!("Peer: ignoring message type '{}'", kind);
                PeerReaction::None
            }
        }
    }

    /// Detect a silent peer.
    ///
    /// Returns `Some(silent_ms)` on the connected → disconnected transition
    /// only; repeated calls while still silent return `None`.
    pub fn check_health(&mut self, now_ms: u64) -> Option<u64> {
        let silent_ms = now_ms.saturating_sub(self.status.last_message_at);
        if self.status.connected && silent_ms > self.health_timeout_ms {
            self.status.connected = false;
            warn!(
                "Peer: connection timeout after {} ms, AI engine may be disconnected",
                silent_ms
            );
            return Some(silent_ms);
        }
        None
    }
}
