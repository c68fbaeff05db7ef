//! Backend event channel.
//!
//! Fire-and-forget delivery of the bridge's two report shapes to
//! `POST /api/message`:
//!
//! ```text
//! heartbeat:  {"deviceId": "...", "text": "<greeting>", "k210_status": "connected"|"disconnected"}
//! face event: {"deviceId": "...", "text": "Face detected", "type": "face_event", "count": N}
//! ```
//!
//! Each report is one request.  There is no retry queue: a failed post is
//! reported once and forgotten.

use log::{debug, warn};
use serde::Serialize;

use super::ports::{BackendPort, DeliveryError, KeepAlive};

/// Endpoint for every report.
pub const MESSAGE_ENDPOINT: &str = "/api/message";

const FACE_EVENT_TEXT: &str = "Face detected";

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// 2xx response.
    Delivered(u16),
    /// A response arrived with another status.
    Rejected(u16),
    /// Nothing usable came back.
    Failed(DeliveryError),
}

impl PostOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    /// The failure to report, if any.
    pub fn error(&self) -> Option<DeliveryError> {
        match *self {
            Self::Delivered(_) => None,
            Self::Rejected(code) => Some(DeliveryError::Status(code)),
            Self::Failed(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connected,
    Disconnected,
}

impl From<bool> for LinkState {
    fn from(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

#[derive(Serialize)]
struct HeartbeatReport<'a> {
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    text: &'a str,
    k210_status: LinkState,
}

#[derive(Serialize)]
struct FaceEventReport<'a> {
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    text: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    count: u32,
}

/// Builds and posts reports on behalf of one device.
pub struct EventReporter {
    device_id: String,
    greeting: String,
}

impl EventReporter {
    pub fn new(device_id: impl Into<String>, greeting: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            greeting: greeting.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn heartbeat_body(&self, peer_connected: bool) -> String {
        to_body(&HeartbeatReport {
            device_id: &self.device_id,
            text: &self.greeting,
            k210_status: peer_connected.into(),
        })
    }

    pub fn face_event_body(&self, count: u32) -> String {
        to_body(&FaceEventReport {
            device_id: &self.device_id,
            text: FACE_EVENT_TEXT,
            kind: "face_event",
            count,
        })
    }

    /// Periodic heartbeat carrying the current peer-link flag.
    pub fn post_heartbeat(&self, peer_connected: bool, backend: &mut impl BackendPort) -> PostOutcome {
        post(backend, MESSAGE_ENDPOINT, &self.heartbeat_body(peer_connected))
    }

    /// Forward a face detection.
    pub fn post_face_event(&self, count: u32, backend: &mut impl BackendPort) -> PostOutcome {
        post(backend, MESSAGE_ENDPOINT, &self.face_event_body(count))
    }
}

fn to_body<T: Serialize>(report: &T) -> String {
    // Plain structs of strings and integers always serialise.
    serde_json::to_string(report).unwrap_or_default()
}

/// Single best-effort request.  Never retried.
pub fn post(backend: &mut impl BackendPort, endpoint: &str, body: &str) -> PostOutcome {
    match backend.post(endpoint, body) {
        Ok(code) if (200..300).contains(&code) => {
            debug!("HTTP: POST {} -> {}", endpoint, code);
            PostOutcome::Delivered(code)
        }
        Ok(code) => {
            warn!("HTTP: POST {} -> {}", endpoint, code);
            PostOutcome::Rejected(code)
        }
        Err(e) => {
            warn!("HTTP: POST {} failed: {}", endpoint, e);
            PostOutcome::Failed(e)
        }
    }
}

/// [`BackendPort`] decorator that feeds a [`KeepAlive`] before each request.
pub struct FedBackend<B, W> {
    inner: B,
    keepalive: W,
}

impl<B, W> FedBackend<B, W> {
    pub fn new(inner: B, keepalive: W) -> Self {
        Self { inner, keepalive }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }
}

impl<B: BackendPort, W: KeepAlive> BackendPort for FedBackend<B, W> {
    fn post(&mut self, endpoint: &str, body: &str) -> Result<u16, DeliveryError> {
        self.keepalive.feed();
        self.inner.post(endpoint, body)
    }
}
