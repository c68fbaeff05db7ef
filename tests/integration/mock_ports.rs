//! Mock ports for integration tests.
//!
//! Every mock records what the relay did to it so tests can assert on the
//! full history without touching a UART, a socket or the clock.

use std::cell::Cell;
use std::collections::VecDeque;

use tbao_bridge::app::events::BridgeEvent;
use tbao_bridge::app::ports::{
    BackendPort, ChannelError, ClockPort, ControlEvent, ControlTransport, DeliveryError,
    EventSink, KeepAlive, LinkError, PeerLinkPort,
};
use tbao_bridge::app::service::{Ports, Relay};
use tbao_bridge::config::BridgeConfig;

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

// ── Peer link ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPeer {
    inbound: VecDeque<u8>,
    pub written: Vec<String>,
    pub refuse_writes: bool,
    pub fail_next_read: bool,
    /// Largest chunk handed out per read, 0 = unlimited.
    pub max_chunk: usize,
}

#[allow(dead_code)]
impl MockPeer {
    /// Queue one peer line; the newline is appended.
    pub fn send_line(&mut self, line: &str) {
        self.inbound.extend(line.as_bytes());
        self.inbound.push_back(b'\n');
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.inbound.len()
    }

    /// `type` tags of every written directive, in order.
    pub fn written_kinds(&self) -> Vec<String> {
        self.written
            .iter()
            .map(|line| {
                let v: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
                v["type"].as_str().unwrap().to_owned()
            })
            .collect()
    }

    /// `data` payloads of every written directive, in order.
    pub fn written_data(&self) -> Vec<serde_json::Value> {
        self.written
            .iter()
            .map(|line| {
                let v: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
                v["data"].clone()
            })
            .collect()
    }
}

impl PeerLinkPort for MockPeer {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if self.fail_next_read {
            self.fail_next_read = false;
            return Err(LinkError::Io);
        }
        let limit = if self.max_chunk == 0 { buf.len() } else { buf.len().min(self.max_chunk) };
        let n = limit.min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        if self.refuse_writes {
            return Err(LinkError::WouldBlock);
        }
        assert!(line.ends_with('\n'), "directive lines are newline-terminated");
        self.written.push(line.to_owned());
        Ok(())
    }
}

// ── Control transport ─────────────────────────────────────────

#[derive(Default)]
pub struct MockControl {
    events: VecDeque<ControlEvent>,
    pub opened: Vec<String>,
    pub closes: usize,
    pub fail_open: bool,
    /// Queue `Connected` right after a successful open.
    pub auto_connect: bool,
}

#[allow(dead_code)]
impl MockControl {
    pub fn auto() -> Self {
        Self { auto_connect: true, ..Self::default() }
    }

    pub fn push_event(&mut self, event: ControlEvent) {
        self.events.push_back(event);
    }

    pub fn push_text(&mut self, text: &str) {
        let frame = heapless::String::try_from(text).unwrap();
        self.events.push_back(ControlEvent::Text(frame));
    }
}

impl ControlTransport for MockControl {
    fn open(&mut self, path: &str) -> Result<(), ChannelError> {
        self.opened.push(path.to_owned());
        if self.fail_open {
            return Err(ChannelError::OpenFailed);
        }
        if self.auto_connect {
            self.events.push_back(ControlEvent::Connected);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }

    fn poll_event(&mut self) -> Option<ControlEvent> {
        self.events.pop_front()
    }
}

// ── Backend ───────────────────────────────────────────────────

pub struct MockBackend {
    pub posts: Vec<(String, serde_json::Value)>,
    pub reply: Result<u16, DeliveryError>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self { posts: Vec::new(), reply: Ok(200) }
    }
}

#[allow(dead_code)]
impl MockBackend {
    pub fn heartbeats(&self) -> Vec<&serde_json::Value> {
        self.posts
            .iter()
            .map(|(_, body)| body)
            .filter(|body| body.get("k210_status").is_some())
            .collect()
    }

    pub fn face_events(&self) -> Vec<&serde_json::Value> {
        self.posts
            .iter()
            .map(|(_, body)| body)
            .filter(|body| body["type"] == "face_event")
            .collect()
    }
}

impl BackendPort for MockBackend {
    fn post(&mut self, endpoint: &str, body: &str) -> Result<u16, DeliveryError> {
        let json = serde_json::from_str(body).expect("report bodies are JSON");
        self.posts.push((endpoint.to_owned(), json));
        self.reply
    }
}

// ── Keep-alive ────────────────────────────────────────────────

/// Counts watchdog feeds.
#[derive(Default)]
pub struct FeedCounter {
    feeds: Cell<usize>,
}

#[allow(dead_code)]
impl FeedCounter {
    pub fn count(&self) -> usize {
        self.feeds.get()
    }
}

impl KeepAlive for FeedCounter {
    fn feed(&self) {
        self.feeds.set(self.feeds.get() + 1);
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<BridgeEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&BridgeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &BridgeEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

pub type MockPorts = Ports<ManualClock, MockPeer, MockControl, MockBackend>;

pub struct Harness {
    pub relay: Relay,
    pub ports: MockPorts,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Harness {
    /// A relay at t=0 with an auto-connecting control channel.  `start` is
    /// not called.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let ports = Ports {
            clock: ManualClock::default(),
            peer: MockPeer::default(),
            control: MockControl::auto(),
            backend: MockBackend::default(),
        };
        Self {
            relay: Relay::new(&config, 0),
            ports,
            sink: RecordingSink::default(),
        }
    }

    pub fn start(&mut self) {
        self.relay.start(&mut self.ports, &mut self.sink);
    }

    pub fn step(&mut self) {
        self.relay.run_iteration(&mut self.ports, &mut self.sink);
    }

    /// Advance the clock and run one iteration.
    pub fn step_at(&mut self, now_ms: u64) {
        self.ports.clock.set(now_ms);
        self.step();
    }

    pub fn advance(&mut self, ms: u64) {
        self.ports.clock.advance(ms);
        self.step();
    }
}

pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        device_id: "dev-001".into(),
        ..BridgeConfig::default()
    }
}
