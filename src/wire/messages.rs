//! Closed message vocabularies for both peers.
//!
//! String `type` tags are decoded exactly once, here at the boundary.  The
//! relay core only ever matches on these enums, so adding a message kind is
//! a compile-checked change.
//!
//! | Direction          | Type            | Tags                                   |
//! |--------------------|-----------------|----------------------------------------|
//! | K210 → bridge      | [`PeerMessage`] | startup, face_detection, image_analysis, status_response, audio_event, error |
//! | bridge → K210      | [`Directive`]   | set_mode, capture_image, start_audio, stop_audio, system_status |
//! | backend → bridge   | [`ControlFrame`]| set_ai_mode, capture_image, start_audio, stop_audio; `kind` notices |

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::envelope::Envelope;
use crate::error::{ParseError, ParseErrorKind};

// ───────────────────────────────────────────────────────────────
// Peer mode
// ───────────────────────────────────────────────────────────────

/// Operating mode reported by the co-processor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PeerMode {
    #[default]
    Idle,
    FaceDetection,
    Audio,
    /// Any other label, kept verbatim (e.g. `image_analysis`, `sleep`).
    Other(String),
}

impl PeerMode {
    pub fn parse(label: &str) -> Self {
        match label {
            "idle" => Self::Idle,
            "face_detection" => Self::FaceDetection,
            "audio" | "audio_processing" => Self::Audio,
            other => Self::Other(other.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::FaceDetection => "face_detection",
            Self::Audio => "audio",
            Self::Other(label) => label,
        }
    }
}

impl<'de> Deserialize<'de> for PeerMode {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let label = String::deserialize(d)?;
        Ok(Self::parse(&label))
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound: K210 → bridge
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct StartupInfo {
    pub status: Option<String>,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FaceBox {
    pub id: u32,
    pub confidence: f32,
    pub rect: FaceRect,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FaceDetection {
    pub detected: bool,
    pub count: u32,
    pub faces: Vec<FaceBox>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ImageAnalysis {
    pub brightness: i64,
    pub has_motion: bool,
    pub scene: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct StatusReport {
    pub mode: PeerMode,
    pub face_detected: bool,
    pub audio_active: bool,
    pub memory_free: Option<u64>,
    pub uptime: Option<u64>,
}

/// A decoded message from the co-processor.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    Startup(StartupInfo),
    FaceDetection(FaceDetection),
    ImageAnalysis(ImageAnalysis),
    StatusResponse(StatusReport),
    /// Audio pipeline notification; payload is passed through for logging.
    AudioEvent(Value),
    /// The co-processor reported an internal fault.
    Error { message: String },
    /// A tag outside the vocabulary.  Still counts as link activity.
    Unrecognized(String),
}

impl PeerMessage {
    /// Interpret an envelope's payload according to its `type`.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ParseError> {
        let Envelope { kind, data, .. } = envelope;
        let msg = match kind.as_str() {
            "startup" => Self::Startup(payload(&kind, data)?),
            "face_detection" => Self::FaceDetection(payload(&kind, data)?),
            "image_analysis" => Self::ImageAnalysis(payload(&kind, data)?),
            "status_response" => Self::StatusResponse(payload(&kind, data)?),
            "audio_event" => Self::AudioEvent(data),
            "error" => Self::Error {
                message: data
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| data.to_string(), str::to_owned),
            },
            _ => Self::Unrecognized(kind),
        };
        Ok(msg)
    }
}

/// Deserialize a typed payload; `null` / absent data takes all defaults.
fn payload<T: DeserializeOwned + Default>(kind: &str, data: Value) -> Result<T, ParseError> {
    if data.is_null() {
        return Ok(T::default());
    }
    T::deserialize(&data).map_err(|_| {
        ParseError::new(
            ParseErrorKind::InvalidPayload,
            &format!("{kind}: {data}"),
        )
    })
}

// ───────────────────────────────────────────────────────────────
// Outbound: bridge → K210
// ───────────────────────────────────────────────────────────────

/// An instruction sent to the co-processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Switch operating mode.  The label is forwarded verbatim.
    SetMode { mode: String },
    CaptureImage,
    StartAudio,
    StopAudio,
    /// Ask the co-processor for a `status_response`.
    SystemStatus,
}

impl Directive {
    pub fn set_mode(mode: impl Into<String>) -> Self {
        Self::SetMode { mode: mode.into() }
    }

    /// The `type` tag on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetMode { .. } => "set_mode",
            Self::CaptureImage => "capture_image",
            Self::StartAudio => "start_audio",
            Self::StopAudio => "stop_audio",
            Self::SystemStatus => "system_status",
        }
    }

    /// The `data` object on the wire.
    pub fn payload(&self) -> Value {
        match self {
            Self::SetMode { mode } => json!({ "mode": mode }),
            _ => json!({}),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound: backend → bridge
// ───────────────────────────────────────────────────────────────

/// A command the backend may issue over the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    SetAiMode { mode: String },
    CaptureImage,
    StartAudio,
    StopAudio,
}

/// One decoded control-channel text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Command(BackendCommand),
    /// Backend push of the form `{"kind": "...", "text": "..."}`
    /// (greeting, companion reply, vision result).  Informational only.
    Notice { kind: String, text: String },
}

/// Decode a control-channel text frame.
pub fn parse_control_frame(text: &str) -> Result<ControlFrame, ParseError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidJson, text))?;
    if !value.is_object() {
        return Err(ParseError::new(ParseErrorKind::InvalidJson, text));
    }

    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        if let Some(kind) = value.get("kind").and_then(Value::as_str) {
            return Ok(ControlFrame::Notice {
                kind: kind.into(),
                text: value
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .into(),
            });
        }
        return Err(ParseError::new(ParseErrorKind::MissingField("type"), text));
    };

    let command = match kind {
        "set_ai_mode" => {
            let mode = value
                .get("mode")
                .and_then(Value::as_str)
                .ok_or_else(|| ParseError::new(ParseErrorKind::MissingField("mode"), text))?;
            BackendCommand::SetAiMode { mode: mode.into() }
        }
        "capture_image" => BackendCommand::CaptureImage,
        "start_audio" => BackendCommand::StartAudio,
        "stop_audio" => BackendCommand::StopAudio,
        _ => return Err(ParseError::new(ParseErrorKind::UnknownType, text)),
    };
    Ok(ControlFrame::Command(command))
}
