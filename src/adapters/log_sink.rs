//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`BridgeEvent`] as one tagged
//! line to the ESP-IDF logger (UART0 / USB-CDC in production):
//!
//! | Tag      | Source                                   |
//! |----------|------------------------------------------|
//! | `PEER |` | serial link to the K210                  |
//! | `CTRL |` | backend control channel                  |
//! | `HTTP |` | backend event channel                    |
//! | `DROP |` | input that was discarded                 |

use log::Level;

use crate::app::events::BridgeEvent;
use crate::app::ports::EventSink;
use crate::error::Error;

/// Adapter that logs every [`BridgeEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// Level and text of the log line for `event`.
pub fn render(event: &BridgeEvent) -> (Level, String) {
    match event {
        BridgeEvent::Started { device_id } => (Level::Info, format!("START | device_id={}", device_id)),

        BridgeEvent::PeerConnected => (Level::Info, "PEER | startup received, link up".into()),
        BridgeEvent::PeerStatus(s) => (
            Level::Info,
            format!(
                "PEER | status mode={} face={} audio={} connected={}",
                s.mode.as_str(),
                s.face_detected,
                s.audio_active,
                s.connected,
            ),
        ),
        BridgeEvent::FaceDetection { detected: true, count } => {
            (Level::Info, format!("PEER | face detected, count={}", count))
        }
        BridgeEvent::FaceDetection { detected: false, .. } => (Level::Debug, "PEER | face cleared".into()),
        BridgeEvent::ImageAnalysis { brightness } => {
            (Level::Debug, format!("PEER | image brightness={}", brightness))
        }
        BridgeEvent::AudioEvent(data) => (Level::Info, format!("PEER | audio event {}", data)),
        BridgeEvent::PeerFault(message) => (Level::Warn, format!("PEER | peer error: {}", message)),
        BridgeEvent::DirectiveSent(kind) => (Level::Debug, format!("PEER | -> {}", kind)),
        BridgeEvent::DirectiveDropped(kind) => {
            (Level::Warn, format!("DROP | directive {} (queue full)", kind))
        }

        BridgeEvent::ControlConnecting => (Level::Info, "CTRL | connecting".into()),
        BridgeEvent::ControlConnected => (Level::Info, "CTRL | connected".into()),
        BridgeEvent::ControlNotice { kind, text } => {
            (Level::Info, format!("CTRL | notice {}: {}", kind, text))
        }

        BridgeEvent::Posted { endpoint, status } => {
            (Level::Debug, format!("HTTP | {} -> {}", endpoint, status))
        }

        BridgeEvent::Fault(error) => (Level::Warn, format!("{} {}", fault_tag(error), error)),
    }
}

fn fault_tag(error: &Error) -> &'static str {
    match error {
        Error::LinkTimeout { .. } | Error::Link(_) => "PEER |",
        Error::Channel(_) => "CTRL |",
        Error::Delivery(_) => "HTTP |",
        Error::Parse(_) | Error::Config(_) => "DROP |",
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &BridgeEvent) {
        let (level, line) = render(event);
        log::log!(level, "{}", line);
    }
}
