//! Relay service: the hexagonal core.
//!
//! [`Relay`] is the single owned context of the bridge: peer link state,
//! control channel state, the line decoder, the pending directive queue,
//! the interval timers and the event reporter.  All I/O flows through the
//! port traits bundled in [`Ports`], so the whole relay is testable with
//! mock adapters and a manual clock.
//!
//! ```text
//!  ControlTransport ──▶ ┌──────────────────────────┐ ──▶ BackendPort
//!                       │          Relay           │
//!      PeerLinkPort ◀──▶│ PeerLink · ControlLink   │ ──▶ EventSink
//!                       │ Pending · Scheduler      │
//!         ClockPort ──▶ └──────────────────────────┘
//! ```
//!
//! One call to [`Relay::run_iteration`] performs, in order:
//!
//! 1. control channel pump (frames become queued directives)
//! 2. peer drain until no bytes remain (lines become state changes)
//! 3. peer health check
//! 4. status poll timer
//! 5. heartbeat timer

use core::mem;

use log::{debug, info};

use crate::config::BridgeConfig;
use crate::error::{Error, ParseErrorKind};
use crate::scheduler::Scheduler;
use crate::wire::codec::{LineDecoder, decode_line};
use crate::wire::messages::{ControlFrame, Directive, PeerMessage, parse_control_frame};

use super::commands::translate;
use super::control::{ControlLink, ControlOutput};
use super::events::BridgeEvent;
use super::peer::{PeerLink, PeerReaction, PeerStatus};
use super::pending::PendingCommandQueue;
use super::ports::{
    BackendPort, ClockPort, ControlTransport, EventSink, PeerLinkPort, SchedulerDelegate, TimerId,
};
use super::report::{EventReporter, MESSAGE_ENDPOINT, PostOutcome};

/// Bytes pulled from the serial link per read call.
const READ_CHUNK: usize = 256;

// ───────────────────────────────────────────────────────────────
// Ports bundle
// ───────────────────────────────────────────────────────────────

/// Everything the relay talks to.
pub struct Ports<K, P, C, B> {
    pub clock: K,
    pub peer: P,
    pub control: C,
    pub backend: B,
}

// ───────────────────────────────────────────────────────────────
// Relay
// ───────────────────────────────────────────────────────────────

pub struct Relay {
    peer: PeerLink,
    control: ControlLink,
    decoder: LineDecoder,
    pending: PendingCommandQueue,
    scheduler: Scheduler,
    reporter: EventReporter,
    /// Set while the serial link refuses writes; the fault is reported once.
    write_stalled: bool,
}

impl Relay {
    /// Build the relay.  All timers start counting from `now_ms`.
    pub fn new(config: &BridgeConfig, now_ms: u64) -> Self {
        Self {
            peer: PeerLink::new(config.health_timeout_ms, now_ms),
            control: ControlLink::new(
                config.control_path(),
                config.control_reconnect_ms,
                config.control_connect_timeout_ms,
                now_ms,
            ),
            decoder: LineDecoder::new(),
            pending: PendingCommandQueue::new(),
            scheduler: Scheduler::new(
                config.status_poll_interval_ms,
                config.heartbeat_interval_ms,
                now_ms,
            ),
            reporter: EventReporter::new(config.device_id.as_str(), config.greeting.as_str()),
            write_stalled: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the bridge: one heartbeat goes out before the first
    /// interval elapses.
    pub fn start<K, P, C, B>(&mut self, ports: &mut Ports<K, P, C, B>, sink: &mut impl EventSink)
    where
        B: BackendPort,
    {
        info!("Relay started as '{}'", self.reporter.device_id());
        sink.emit(&BridgeEvent::Started {
            device_id: self.reporter.device_id().into(),
        });
        let outcome = self.reporter.post_heartbeat(self.peer.is_connected(), &mut ports.backend);
        report_post(outcome, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn peer_status(&self) -> &PeerStatus {
        self.peer.status()
    }

    pub fn control(&self) -> &ControlLink {
        &self.control
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Run one pass of the relay.  Never blocks beyond the ports' own
    /// bounded timeouts and never returns an error: every failure is
    /// reported through `sink` as [`BridgeEvent::Fault`].
    pub fn run_iteration<K, P, C, B>(&mut self, ports: &mut Ports<K, P, C, B>, sink: &mut impl EventSink)
    where
        K: ClockPort,
        P: PeerLinkPort,
        C: ControlTransport,
        B: BackendPort,
    {
        let now = ports.clock.now_ms();

        // 1. Control channel
        self.pump_control(&mut ports.control, now, sink);
        self.flush(&mut ports.peer, now, sink);

        // 2. Peer drain
        self.drain_peer(&mut ports.peer, &mut ports.backend, now, sink);
        self.flush(&mut ports.peer, now, sink);

        // 3. Health check
        if let Some(silent_ms) = self.peer.check_health(now) {
            sink.emit(&BridgeEvent::Fault(Error::LinkTimeout { silent_ms }));
        }

        // 4 + 5. Timers
        let mut fired = FiredTimers::default();
        self.scheduler.tick(now, &mut fired);
        if fired.status_poll {
            self.enqueue(Directive::SystemStatus, sink);
            self.flush(&mut ports.peer, now, sink);
        }
        if fired.heartbeat {
            let outcome = self
                .reporter
                .post_heartbeat(self.peer.is_connected(), &mut ports.backend);
            report_post(outcome, sink);
        }
    }

    fn pump_control(&mut self, transport: &mut impl ControlTransport, now: u64, sink: &mut impl EventSink) {
        let pending = &mut self.pending;
        self.control.pump(transport, now, |output| match output {
            ControlOutput::Connecting => sink.emit(&BridgeEvent::ControlConnecting),
            ControlOutput::Connected => sink.emit(&BridgeEvent::ControlConnected),
            ControlOutput::Disconnected(e) => sink.emit(&BridgeEvent::Fault(Error::Channel(e))),
            ControlOutput::Text(text) => match parse_control_frame(text) {
                Ok(ControlFrame::Command(command)) => {
                    debug!("Control: command {:?}", command);
                    enqueue(pending, translate(command), sink);
                }
                Ok(ControlFrame::Notice { kind, text }) => {
                    sink.emit(&BridgeEvent::ControlNotice { kind, text });
                }
                Err(e) => sink.emit(&BridgeEvent::Fault(Error::Parse(e))),
            },
        });
    }

    fn drain_peer(
        &mut self,
        peer: &mut impl PeerLinkPort,
        backend: &mut impl BackendPort,
        now: u64,
        sink: &mut impl EventSink,
    ) {
        // The decoder yields borrowed lines, so it is moved out while each
        // line is dispatched against the rest of the relay.
        let mut decoder = mem::take(&mut self.decoder);
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match peer.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => decoder.feed(&buf[..n], |line| match line {
                    Ok(text) => self.dispatch_line(text, backend, now, sink),
                    Err(e) => sink.emit(&BridgeEvent::Fault(Error::Parse(e))),
                }),
                Err(e) => {
                    sink.emit(&BridgeEvent::Fault(Error::Link(e)));
                    break;
                }
            }
        }
        self.decoder = decoder;
    }

    fn dispatch_line(&mut self, line: &str, backend: &mut impl BackendPort, now: u64, sink: &mut impl EventSink) {
        let envelope = match decode_line(line) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return,
            Err(e) => {
                // A well-formed object without a usable `type` still shows
                // the peer is alive.
                if matches!(e.kind, ParseErrorKind::MissingField(_) | ParseErrorKind::InvalidPayload) {
                    self.peer.touch(now);
                }
                sink.emit(&BridgeEvent::Fault(Error::Parse(e)));
                return;
            }
        };

        let (message, reaction) = match self.peer.handle(envelope, now) {
            Ok(handled) => handled,
            Err(e) => {
                sink.emit(&BridgeEvent::Fault(Error::Parse(e)));
                return;
            }
        };

        if let Some(event) = self.observe(message) {
            sink.emit(&event);
        }

        match reaction {
            PeerReaction::None => {}
            PeerReaction::Directive(directive) => {
                if let Some(evicted) = self.pending.push_urgent(directive) {
                    sink.emit(&BridgeEvent::DirectiveDropped(evicted.kind()));
                }
            }
            PeerReaction::ReportFace { count } => {
                let outcome = self.reporter.post_face_event(count, backend);
                report_post(outcome, sink);
            }
        }
    }

    /// Diagnostic event for a handled peer message.
    fn observe(&self, message: PeerMessage) -> Option<BridgeEvent> {
        let event = match message {
            PeerMessage::Startup(_) => BridgeEvent::PeerConnected,
            PeerMessage::FaceDetection(face) => BridgeEvent::FaceDetection {
                detected: face.detected,
                count: face.count,
            },
            PeerMessage::ImageAnalysis(analysis) => BridgeEvent::ImageAnalysis {
                brightness: analysis.brightness,
            },
            PeerMessage::StatusResponse(_) => BridgeEvent::PeerStatus(self.peer.snapshot()),
            PeerMessage::AudioEvent(data) => BridgeEvent::AudioEvent(data.to_string()),
            PeerMessage::Error { message } => BridgeEvent::PeerFault(message),
            PeerMessage::Unrecognized(_) => return None,
        };
        Some(event)
    }

    fn enqueue(&mut self, directive: Directive, sink: &mut impl EventSink) {
        enqueue(&mut self.pending, directive, sink);
    }

    fn flush(&mut self, peer: &mut impl PeerLinkPort, now: u64, sink: &mut impl EventSink) {
        if self.pending.is_empty() {
            return;
        }
        match self
            .pending
            .flush(peer, now, |d| sink.emit(&BridgeEvent::DirectiveSent(d.kind())))
        {
            Ok(_) => self.write_stalled = false,
            Err(e) => {
                if !self.write_stalled {
                    sink.emit(&BridgeEvent::Fault(Error::Link(e)));
                }
                self.write_stalled = true;
            }
        }
    }
}

fn enqueue(pending: &mut PendingCommandQueue, directive: Directive, sink: &mut impl EventSink) {
    if let Err(rejected) = pending.push(directive) {
        sink.emit(&BridgeEvent::DirectiveDropped(rejected.kind()));
    }
}

fn report_post(outcome: PostOutcome, sink: &mut impl EventSink) {
    match outcome {
        PostOutcome::Delivered(status) => sink.emit(&BridgeEvent::Posted {
            endpoint: MESSAGE_ENDPOINT,
            status,
        }),
        PostOutcome::Rejected(_) | PostOutcome::Failed(_) => {
            if let Some(e) = outcome.error() {
                sink.emit(&BridgeEvent::Fault(Error::Delivery(e)));
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate
// ───────────────────────────────────────────────────────────────

/// Collects which timers fired during one tick.
#[derive(Default)]
struct FiredTimers {
    status_poll: bool,
    heartbeat: bool,
}

impl SchedulerDelegate for FiredTimers {
    fn on_timer_fired(&mut self, timer: TimerId) {
        match timer {
            TimerId::StatusPoll => self.status_poll = true,
            TimerId::Heartbeat => self.heartbeat = true,
        }
    }
}
