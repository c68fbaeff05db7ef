//! Integration tests for the backend event channel: heartbeat cadence,
//! face-event forwarding and delivery-failure policy.

use super::mock_ports::{
    FeedCounter, Harness, ManualClock, MockBackend, MockControl, MockPeer, RecordingSink, test_config,
};

use tbao_bridge::app::events::BridgeEvent;
use tbao_bridge::app::ports::DeliveryError;
use tbao_bridge::app::report::FedBackend;
use tbao_bridge::app::service::{Ports, Relay};
use tbao_bridge::error::Error;

const STARTUP: &str = r#"{"type":"startup","timestamp":0,"data":{}}"#;

fn delivery_faults(h: &Harness) -> Vec<DeliveryError> {
    h.sink
        .events
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::Fault(Error::Delivery(d)) => Some(*d),
            _ => None,
        })
        .collect()
}

// ── Start ─────────────────────────────────────────────────────

#[test]
fn start_announces_and_posts_one_heartbeat() {
    let mut h = Harness::new();
    h.start();

    assert_eq!(
        h.sink.events[0],
        BridgeEvent::Started { device_id: "dev-001".into() }
    );
    assert_eq!(h.ports.backend.posts.len(), 1);
    let (endpoint, body) = &h.ports.backend.posts[0];
    assert_eq!(endpoint, "/api/message");
    assert_eq!(body["deviceId"], "dev-001");
    assert_eq!(body["text"], "Hello from T-Bao ESP32");
    assert_eq!(body["k210_status"], "disconnected");
    assert!(h.sink.events.contains(&BridgeEvent::Posted {
        endpoint: "/api/message",
        status: 200,
    }));
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_fires_each_interval_without_a_peer() {
    let mut h = Harness::new();
    h.step_at(30_000);
    assert!(h.ports.backend.heartbeats().is_empty());

    h.step_at(30_001);
    h.step_at(45_000);
    h.step_at(60_002);
    let beats = h.ports.backend.heartbeats();
    assert_eq!(beats.len(), 2);
    assert!(beats.iter().all(|b| b["k210_status"] == "disconnected"));
}

#[test]
fn heartbeat_reflects_link_state_at_fire_time() {
    let mut h = Harness::new();
    h.step_at(0);
    // Keep the peer chatty so the health check never trips.
    for t in (5_000..=30_000).step_by(5_000) {
        h.ports.peer.send_line(STARTUP);
        h.step_at(t);
    }
    h.step_at(30_001);
    assert_eq!(h.ports.backend.heartbeats()[0]["k210_status"], "connected");

    h.step_at(60_002);
    assert!(!h.relay.peer_status().connected);
    assert_eq!(h.ports.backend.heartbeats()[1]["k210_status"], "disconnected");
}

// ── Face events ───────────────────────────────────────────────

#[test]
fn detected_face_posts_one_event() {
    let mut h = Harness::new();
    h.ports
        .peer
        .send_line(r#"{"type":"face_detection","timestamp":4,"data":{"detected":true,"count":3}}"#);
    h.step_at(10);

    let events = h.ports.backend.face_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["count"], 3);
    assert_eq!(events[0]["deviceId"], "dev-001");
    assert_eq!(events[0]["text"], "Face detected");
    assert_eq!(h.ports.backend.posts[0].0, "/api/message");
    assert!(h.relay.peer_status().face_detected);
}

#[test]
fn cleared_face_posts_nothing() {
    let mut h = Harness::new();
    h.ports
        .peer
        .send_line(r#"{"type":"face_detection","timestamp":4,"data":{"detected":false,"count":0}}"#);
    h.step_at(10);

    assert!(h.ports.backend.posts.is_empty());
    assert!(!h.relay.peer_status().face_detected);
}

// ── Failure policy ────────────────────────────────────────────

#[test]
fn unassociated_network_is_reported_and_not_retried() {
    let mut h = Harness::new();
    h.ports.backend.reply = Err(DeliveryError::NotAssociated);
    h.ports
        .peer
        .send_line(r#"{"type":"face_detection","timestamp":0,"data":{"detected":true,"count":1}}"#);
    h.step_at(1);
    h.step_at(2);
    h.step_at(3);

    assert_eq!(h.ports.backend.posts.len(), 1);
    assert_eq!(delivery_faults(&h), [DeliveryError::NotAssociated]);
}

#[test]
fn non_success_status_is_a_delivery_fault() {
    let mut h = Harness::new();
    h.ports.backend.reply = Ok(500);
    h.start();

    assert_eq!(delivery_faults(&h), [DeliveryError::Status(500)]);
    assert_eq!(h.sink.count(|e| matches!(e, BridgeEvent::Posted { .. })), 0);
}

#[test]
fn failed_post_does_not_stall_the_relay() {
    let mut h = Harness::new();
    h.ports.backend.reply = Err(DeliveryError::Timeout);
    h.ports
        .peer
        .send_line(r#"{"type":"face_detection","timestamp":0,"data":{"detected":true,"count":1}}"#);
    h.ports.peer.send_line(STARTUP);
    h.step_at(1);

    assert!(h.relay.peer_status().connected);
    assert_eq!(h.ports.peer.written_kinds(), ["set_mode"]);
}

// ── Watchdog feeding ──────────────────────────────────────────

#[test]
fn every_post_in_a_busy_iteration_feeds_the_watchdog() {
    let feeds = FeedCounter::default();
    let mut backend = MockBackend::default();
    backend.reply = Err(DeliveryError::Timeout);
    let mut ports = Ports {
        clock: ManualClock::default(),
        peer: MockPeer::default(),
        control: MockControl::auto(),
        backend: FedBackend::new(backend, &feeds),
    };
    let mut sink = RecordingSink::default();
    let mut relay = Relay::new(&test_config(), 0);

    for i in 0..6 {
        let detected = i % 2 == 0;
        ports.peer.send_line(&format!(
            r#"{{"type":"face_detection","timestamp":{i},"data":{{"detected":{detected},"count":1}}}}"#
        ));
    }
    ports.clock.set(30_001);
    relay.run_iteration(&mut ports, &mut sink);

    let posts = ports.backend.inner().posts.len();
    assert_eq!(posts, 4, "three face events and the heartbeat in one iteration");
    assert_eq!(feeds.count(), posts);
}
