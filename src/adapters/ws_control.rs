//! WebSocket client for the backend control channel.
//!
//! Implements [`ControlTransport`].  The ESP-IDF WebSocket client runs its own
//! task and reports through a callback; the callback never touches relay
//! state, it only pushes [`ControlEvent`]s into a bounded `embassy-sync`
//! channel that the relay drains with [`ControlTransport::poll_event`].
//!
//! ```text
//! ┌──────────────┐ ControlEvent ┌──────────────┐
//! │  WS client   │─────────────▶│  Relay loop  │
//! │  task (IDF)  │   inbox (8)  │  (sync)      │
//! └──────────────┘              └──────────────┘
//! ```
//!
//! The client's built-in reconnect is disabled: the relay's
//! [`ControlLink`](crate::app::control::ControlLink) owns the backoff.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::ports::{ChannelError, ControlEvent, ControlTransport};

#[cfg(target_os = "espidf")]
use core::time::Duration;
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::EspIOError;
#[cfg(target_os = "espidf")]
use esp_idf_svc::ws::client::{
    EspWebSocketClient, EspWebSocketClientConfig, WebSocketEvent, WebSocketEventType,
};

/// Events buffered between the client task and the relay.
pub const INBOX_DEPTH: usize = 8;

pub type ControlInbox = Channel<CriticalSectionRawMutex, ControlEvent, INBOX_DEPTH>;

#[cfg(target_os = "espidf")]
static CONTROL_INBOX: ControlInbox = Channel::new();

/// Push an event into the inbox.
///
/// Text frames are dropped when the inbox is full.  A state change is never
/// dropped: queued frames are discarded to make room for it.
fn deliver(inbox: &ControlInbox, event: ControlEvent) {
    match inbox.try_send(event) {
        Ok(()) => {}
        Err(embassy_sync::channel::TrySendError::Full(ControlEvent::Text(_))) => {
            warn!("WsControl: inbox full, frame dropped");
        }
        Err(embassy_sync::channel::TrySendError::Full(state)) => {
            warn!("WsControl: inbox full, discarding queued frames for {:?}", state);
            inbox.clear();
            if let Err(embassy_sync::channel::TrySendError::Full(state)) = inbox.try_send(state) {
                warn!("WsControl: inbox still full, {:?} lost", state);
            }
        }
    }
}

/// Copy an inbound text frame into a fixed-capacity event.
fn text_event(text: &str) -> Option<ControlEvent> {
    match heapless::String::try_from(text) {
        Ok(frame) => Some(ControlEvent::Text(frame)),
        Err(()) => {
            warn!("WsControl: {} byte frame exceeds inbox capacity, dropped", text.len());
            None
        }
    }
}

pub struct WsControl {
    /// `ws://host:port`; the path comes from the relay on each open.
    origin: String,

    #[cfg(target_os = "espidf")]
    timeout: Duration,
    #[cfg(target_os = "espidf")]
    client: Option<EspWebSocketClient<'static>>,

    #[cfg(not(target_os = "espidf"))]
    inbox: ControlInbox,
    #[cfg(not(target_os = "espidf"))]
    fail_open: bool,
    #[cfg(not(target_os = "espidf"))]
    opened: Vec<String>,
    #[cfg(not(target_os = "espidf"))]
    open: bool,
}

impl WsControl {
    /// `timeout_ms` bounds each blocking client operation (send, stop).
    #[cfg(target_os = "espidf")]
    pub fn new(origin: impl Into<String>, timeout_ms: u64) -> Self {
        let origin = origin.into();
        info!("WsControl: backend {}", origin);
        Self {
            origin,
            timeout: Duration::from_millis(timeout_ms),
            client: None,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(origin: impl Into<String>, _timeout_ms: u64) -> Self {
        let origin = origin.into();
        info!("WsControl: simulation backend for {}", origin);
        Self {
            origin,
            inbox: Channel::new(),
            fail_open: false,
            opened: Vec::new(),
            open: false,
        }
    }

    fn uri(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    fn inbox(&self) -> &ControlInbox {
        #[cfg(target_os = "espidf")]
        {
            &CONTROL_INBOX
        }
        #[cfg(not(target_os = "espidf"))]
        {
            &self.inbox
        }
    }

    /// Discard events left over from a previous connection.
    fn drain_stale(&self) {
        let inbox = self.inbox();
        while inbox.try_receive().is_ok() {}
    }
}

#[cfg(not(target_os = "espidf"))]
impl WsControl {
    /// Simulation: make the next opens fail (or succeed again).
    pub fn sim_fail_open(&mut self, fail: bool) {
        self.fail_open = fail;
    }

    /// Simulation: a text frame from the backend.
    pub fn sim_push_text(&mut self, text: &str) {
        if let Some(event) = text_event(text) {
            deliver(&self.inbox, event);
        }
    }

    /// Simulation: the backend closed the connection.
    pub fn sim_drop(&mut self) {
        self.open = false;
        deliver(&self.inbox, ControlEvent::Disconnected);
    }

    /// Simulation: every URI passed to `open`, oldest first.
    pub fn sim_opened(&self) -> &[String] {
        &self.opened
    }

    pub fn sim_is_open(&self) -> bool {
        self.open
    }
}

impl ControlTransport for WsControl {
    fn open(&mut self, path: &str) -> Result<(), ChannelError> {
        self.close();
        self.drain_stale();
        let uri = self.uri(path);
        info!("WsControl: connecting to {}", uri);

        #[cfg(target_os = "espidf")]
        {
            let config = EspWebSocketClientConfig {
                disable_auto_reconnect: true,
                ..Default::default()
            };
            let client = EspWebSocketClient::new(
                &uri,
                &config,
                self.timeout,
                move |event: &Result<WebSocketEvent<'_>, EspIOError>| match event {
                    Ok(event) => match event.event_type {
                        WebSocketEventType::Connected => {
                            deliver(&CONTROL_INBOX, ControlEvent::Connected);
                        }
                        WebSocketEventType::Disconnected
                        | WebSocketEventType::Close(_)
                        | WebSocketEventType::Closed => {
                            deliver(&CONTROL_INBOX, ControlEvent::Disconnected);
                        }
                        WebSocketEventType::Text(text) => {
                            if let Some(event) = text_event(text) {
                                deliver(&CONTROL_INBOX, event);
                            }
                        }
                        _ => {}
                    },
                    Err(e) => {
                        warn!("WsControl: client error: {}", e);
                        deliver(&CONTROL_INBOX, ControlEvent::Disconnected);
                    }
                },
            )
            .map_err(|e| {
                warn!("WsControl: client start failed: {}", e);
                ChannelError::OpenFailed
            })?;
            self.client = Some(client);
            Ok(())
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.opened.push(uri);
            if self.fail_open {
                return Err(ChannelError::OpenFailed);
            }
            self.open = true;
            deliver(&self.inbox, ControlEvent::Connected);
            Ok(())
        }
    }

    fn close(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            // Dropping the client stops its task and frees the handle.
            if self.client.take().is_some() {
                info!("WsControl: connection closed");
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.open = false;
        }
    }

    fn poll_event(&mut self) -> Option<ControlEvent> {
        self.inbox().try_receive().ok()
    }
}
