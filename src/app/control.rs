//! Backend control channel state.
//!
//! ```text
//!              retry due               Connected event
//!  Disconnected ────────▶ Connecting ─────────────────▶ Connected
//!       ▲                     │                             │
//!       │   connect timeout   │        Disconnected event   │
//!       └─────────────────────┴─────────────────────────────┘
//!            (next attempt scheduled `reconnect_ms` later)
//! ```
//!
//! [`ControlLink`] owns the reconnect policy; the transport underneath only
//! opens, closes and reports events.  Frames are delivered to the caller
//! only while `Connected`.

use log::{debug, info, warn};

use super::ports::{ChannelError, ControlEvent, ControlTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Disconnected,
    Connecting,
    Connected,
}

/// What [`ControlLink::pump`] hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutput<'a> {
    Connecting,
    Connected,
    /// Entered `Disconnected` for this reason; a retry is scheduled.
    Disconnected(ChannelError),
    /// A text frame received while connected.
    Text(&'a str),
}

pub struct ControlLink {
    path: String,
    state: ControlState,
    reconnect_ms: u64,
    connect_timeout_ms: u64,
    /// When the next attempt is due (valid in `Disconnected`).
    retry_at: u64,
    /// When the current attempt started (valid in `Connecting`).
    attempt_started: u64,
}

impl ControlLink {
    /// The first attempt is due at `now_ms`.
    pub fn new(path: impl Into<String>, reconnect_ms: u64, connect_timeout_ms: u64, now_ms: u64) -> Self {
        Self {
            path: path.into(),
            state: ControlState::Disconnected,
            reconnect_ms,
            connect_timeout_ms,
            retry_at: now_ms,
            attempt_started: now_ms,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Drive the connection and collect whatever arrived.
    ///
    /// `on_output` sees each state change and each text frame received
    /// while connected, in arrival order.
    pub fn pump(
        &mut self,
        transport: &mut impl ControlTransport,
        now_ms: u64,
        mut on_output: impl FnMut(ControlOutput<'_>),
    ) {
        while let Some(event) = transport.poll_event() {
            match event {
                ControlEvent::Connected => {
                    if self.state != ControlState::Connected {
                        self.state = ControlState::Connected;
                        info!("Control: connected to {}", self.path);
                        on_output(ControlOutput::Connected);
                    }
                }
                ControlEvent::Disconnected => {
                    if self.state != ControlState::Disconnected {
                        self.enter_disconnected(now_ms);
                        on_output(ControlOutput::Disconnected(ChannelError::Disconnected));
                    }
                }
                ControlEvent::Text(text) => {
                    if self.state == ControlState::Connected {
                        on_output(ControlOutput::Text(&text));
                    } else {
                        debug!("Control: frame while {:?} ignored", self.state);
                    }
                }
            }
        }

        match self.state {
            ControlState::Disconnected if now_ms >= self.retry_at => {
                match transport.open(&self.path) {
                    Ok(()) => {
                        self.state = ControlState::Connecting;
                        self.attempt_started = now_ms;
                        debug!("Control: connecting to {}", self.path);
                        on_output(ControlOutput::Connecting);
                    }
                    Err(e) => {
                        warn!("Control: open failed ({}), retry in {} ms", e, self.reconnect_ms);
                        self.retry_at = now_ms + self.reconnect_ms;
                        on_output(ControlOutput::Disconnected(e));
                    }
                }
            }
            ControlState::Connecting
                if now_ms.saturating_sub(self.attempt_started) > self.connect_timeout_ms =>
            {
                transport.close();
                self.enter_disconnected(now_ms);
                on_output(ControlOutput::Disconnected(ChannelError::ConnectTimeout));
            }
            _ => {}
        }
    }

    fn enter_disconnected(&mut self, now_ms: u64) {
        self.state = ControlState::Disconnected;
        self.retry_at = now_ms + self.reconnect_ms;
        warn!("Control: disconnected, reconnecting in {} ms", self.reconnect_ms);
    }
}
