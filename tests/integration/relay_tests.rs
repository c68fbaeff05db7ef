//! Integration tests for the peer side of the relay loop: serial drain,
//! link state, health check, status poll and directive ordering.

use serde_json::json;

use super::mock_ports::{Harness, ManualClock, test_config};

use tbao_bridge::adapters::http_events::HttpEventClient;
use tbao_bridge::adapters::uart::SerialLink;
use tbao_bridge::adapters::ws_control::WsControl;
use tbao_bridge::app::events::BridgeEvent;
use tbao_bridge::app::pending::PENDING_CAPACITY;
use tbao_bridge::app::ports::LinkError;
use tbao_bridge::app::service::{Ports, Relay};
use tbao_bridge::error::{Error, ParseErrorKind};
use tbao_bridge::wire::messages::PeerMode;

const STARTUP: &str = r#"{"type":"startup","timestamp":1,"data":{"status":"ready"}}"#;

fn is_link_timeout(e: &BridgeEvent) -> bool {
    matches!(e, BridgeEvent::Fault(Error::LinkTimeout { .. }))
}

// ── Peer startup ──────────────────────────────────────────────

#[test]
fn startup_connects_and_sends_face_detection_mode() {
    let mut h = Harness::new();
    h.ports.peer.send_line(STARTUP);
    h.step_at(5);

    assert!(h.relay.peer_status().connected);
    assert_eq!(h.ports.peer.written_kinds(), ["set_mode"]);
    assert_eq!(h.ports.peer.written_data()[0], json!({"mode": "face_detection"}));
    assert!(h.ports.peer.written[0].contains(r#""timestamp":5"#));
    assert_eq!(h.sink.count(|e| *e == BridgeEvent::PeerConnected), 1);
}

#[test]
fn every_startup_sends_exactly_one_mode_directive() {
    let mut h = Harness::new();
    h.ports.peer.send_line(STARTUP);
    h.step_at(1);
    h.ports.peer.send_line(STARTUP);
    h.step_at(2);

    assert_eq!(h.ports.peer.written_kinds(), ["set_mode", "set_mode"]);
}

// ── Health check ──────────────────────────────────────────────

#[test]
fn silence_drops_the_link_exactly_once() {
    let mut h = Harness::new();
    h.ports.peer.send_line(STARTUP);
    h.step_at(0);

    h.step_at(10_000);
    assert!(h.relay.peer_status().connected, "timeout is strictly greater-than");

    h.step_at(10_001);
    assert!(!h.relay.peer_status().connected);
    assert!(h.sink.events.contains(&BridgeEvent::Fault(Error::LinkTimeout { silent_ms: 10_001 })));

    for t in [10_002, 15_000, 25_000] {
        h.step_at(t);
    }
    assert_eq!(h.sink.count(is_link_timeout), 1);
}

#[test]
fn startup_after_timeout_recovers() {
    let mut h = Harness::new();
    h.ports.peer.send_line(STARTUP);
    h.step_at(0);
    h.step_at(20_000);
    assert!(!h.relay.peer_status().connected);

    h.ports.peer.send_line(STARTUP);
    h.step_at(20_010);
    assert!(h.relay.peer_status().connected);
    assert_eq!(h.ports.peer.written_kinds(), ["set_mode", "set_mode"]);
}

#[test]
fn never_connected_peer_raises_no_timeout() {
    let mut h = Harness::new();
    h.step_at(50_000);
    assert_eq!(h.sink.count(is_link_timeout), 0);
}

// ── Dispatch ──────────────────────────────────────────────────

#[test]
fn status_response_updates_peer_status() {
    let mut h = Harness::new();
    h.ports.peer.send_line(
        r#"{"type":"status_response","timestamp":9,"data":{"mode":"audio","face_detected":true,"audio_active":true}}"#,
    );
    h.step_at(100);

    let status = h.relay.peer_status();
    assert_eq!(status.mode, PeerMode::Audio);
    assert!(status.face_detected);
    assert!(status.audio_active);
    assert_eq!(status.last_message_at, 100);
    assert!(h.sink.events.iter().any(|e| matches!(e, BridgeEvent::PeerStatus(s) if s.audio_active)));
}

#[test]
fn unknown_type_refreshes_liveness_only() {
    let mut h = Harness::new();
    h.ports.peer.send_line(r#"{"type":"thermal_report","timestamp":0,"data":{"celsius":41}}"#);
    h.step_at(700);

    assert_eq!(h.relay.peer_status().last_message_at, 700);
    assert!(h.ports.peer.written.is_empty());
    assert!(!h.sink.events.iter().any(|e| matches!(e, BridgeEvent::Fault(_))));
}

#[test]
fn malformed_json_is_dropped_without_touching_status() {
    let mut h = Harness::new();
    h.ports.peer.send_line("{not json");
    h.step_at(500);

    assert_eq!(h.relay.peer_status().last_message_at, 0);
    assert!(!h.relay.peer_status().connected);
    assert!(h.sink.events.iter().any(|e| matches!(
        e,
        BridgeEvent::Fault(Error::Parse(p)) if p.kind == ParseErrorKind::InvalidJson && p.text == "{not json"
    )));
}

#[test]
fn bad_payload_still_counts_as_activity() {
    let mut h = Harness::new();
    h.ports.peer.send_line(r#"{"type":"face_detection","timestamp":0,"data":{"detected":"yes"}}"#);
    h.step_at(300);

    assert_eq!(h.relay.peer_status().last_message_at, 300);
    assert!(h.ports.backend.posts.is_empty());
    assert!(h.sink.events.iter().any(|e| matches!(
        e,
        BridgeEvent::Fault(Error::Parse(p)) if p.kind == ParseErrorKind::InvalidPayload
    )));
}

#[test]
fn object_without_type_counts_as_activity() {
    let mut h = Harness::new();
    h.ports.peer.send_line(r#"{"data":{"x":1}}"#);
    h.step_at(400);

    assert_eq!(h.relay.peer_status().last_message_at, 400);
    assert!(!h.relay.peer_status().connected);
    assert!(h.sink.events.iter().any(|e| matches!(
        e,
        BridgeEvent::Fault(Error::Parse(p)) if p.kind == ParseErrorKind::MissingField("type")
    )));
}

#[test]
fn blank_lines_are_not_errors() {
    let mut h = Harness::new();
    h.ports.peer.send_bytes(b"\n\r\n   \n");
    h.step_at(1);
    assert!(h.sink.events.iter().all(|e| !matches!(e, BridgeEvent::Fault(_))));
}

// ── Drain ─────────────────────────────────────────────────────

#[test]
fn drain_consumes_every_buffered_line_in_one_iteration() {
    let mut h = Harness::new();
    h.ports.peer.max_chunk = 7;
    for i in 0..20 {
        h.ports
            .peer
            .send_line(&format!(r#"{{"type":"image_analysis","timestamp":{i},"data":{{"brightness":{i}}}}}"#));
    }
    h.step_at(1);

    assert_eq!(h.ports.peer.buffered(), 0);
    let brightness: Vec<i64> = h
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::ImageAnalysis { brightness } => Some(*brightness),
            _ => None,
        })
        .collect();
    assert_eq!(brightness, (0..20).collect::<Vec<_>>(), "arrival order preserved");
}

#[test]
fn line_split_across_iterations_is_reassembled() {
    let mut h = Harness::new();
    h.ports.peer.send_bytes(br#"{"type":"star"#);
    h.step_at(1);
    assert!(!h.relay.peer_status().connected);

    h.ports.peer.send_bytes(b"tup\",\"data\":{}}\n");
    h.step_at(2);
    assert!(h.relay.peer_status().connected);
}

#[test]
fn read_error_is_reported_and_the_loop_continues() {
    let mut h = Harness::new();
    h.ports.peer.fail_next_read = true;
    h.ports.peer.send_line(STARTUP);
    h.step_at(1);
    assert!(h.sink.events.contains(&BridgeEvent::Fault(Error::Link(LinkError::Io))));
    assert!(!h.relay.peer_status().connected);

    h.step_at(2);
    assert!(h.relay.peer_status().connected);
}

// ── Status poll ───────────────────────────────────────────────

#[test]
fn status_poll_fires_after_the_interval() {
    let mut h = Harness::new();
    h.step_at(30_000);
    assert!(h.ports.peer.written.is_empty());

    h.step_at(30_001);
    assert_eq!(h.ports.peer.written_kinds(), ["system_status"]);
    assert_eq!(h.ports.peer.written_data()[0], json!({}));

    h.step_at(60_001);
    assert_eq!(h.ports.peer.written.len(), 1);
    h.step_at(60_002);
    assert_eq!(h.ports.peer.written_kinds(), ["system_status", "system_status"]);
}

// ── Ordering and back-pressure ────────────────────────────────

#[test]
fn control_directives_precede_peer_reactions_within_an_iteration() {
    let mut h = Harness::new();
    h.step_at(0); // open
    h.ports.control.push_text(r#"{"type":"capture_image"}"#);
    h.ports.peer.send_line(STARTUP);
    h.step_at(1);

    assert_eq!(h.ports.peer.written_kinds(), ["capture_image", "set_mode"]);
}

#[test]
fn refused_writes_stay_queued_and_fault_once() {
    let mut h = Harness::new();
    h.ports.peer.refuse_writes = true;
    h.ports.peer.send_line(STARTUP);
    h.step_at(1);
    h.step_at(2);
    h.step_at(3);

    assert_eq!(h.relay.pending_len(), 1);
    let stalls = h
        .sink
        .count(|e| *e == BridgeEvent::Fault(Error::Link(LinkError::WouldBlock)));
    assert_eq!(stalls, 1);

    h.ports.peer.refuse_writes = false;
    h.step_at(4);
    assert_eq!(h.relay.pending_len(), 0);
    assert_eq!(h.ports.peer.written_kinds(), ["set_mode"]);
    assert_eq!(h.sink.count(|e| *e == BridgeEvent::DirectiveSent("set_mode")), 1);
}

#[test]
fn full_pending_queue_drops_and_reports() {
    let mut h = Harness::new();
    h.ports.peer.refuse_writes = true;
    h.step_at(0);
    for _ in 0..=PENDING_CAPACITY {
        h.ports.control.push_text(r#"{"type":"start_audio"}"#);
    }
    h.step_at(1);

    assert_eq!(h.relay.pending_len(), PENDING_CAPACITY);
    assert_eq!(h.sink.count(|e| *e == BridgeEvent::DirectiveDropped("start_audio")), 1);
}

#[test]
fn startup_set_mode_survives_a_full_queue() {
    let mut h = Harness::new();
    h.ports.peer.refuse_writes = true;
    h.step_at(0);
    for _ in 0..PENDING_CAPACITY {
        h.ports.control.push_text(r#"{"type":"start_audio"}"#);
    }
    h.step_at(1);
    assert_eq!(h.relay.pending_len(), PENDING_CAPACITY);

    h.ports.peer.send_line(r#"{"type":"startup","timestamp":2,"data":{}}"#);
    h.step_at(2);
    assert!(h.relay.peer_status().connected);
    assert_eq!(h.sink.count(|e| *e == BridgeEvent::DirectiveDropped("set_mode")), 0);
    assert_eq!(h.sink.count(|e| *e == BridgeEvent::DirectiveDropped("start_audio")), 1);

    h.ports.peer.refuse_writes = false;
    h.step_at(3);
    let kinds = h.ports.peer.written_kinds();
    assert_eq!(kinds.iter().filter(|k| *k == "set_mode").count(), 1);
    assert_eq!(kinds.last().map(String::as_str), Some("set_mode"));
    assert_eq!(h.ports.peer.written_data().last().unwrap()["mode"], "face_detection");
}

// ── Host simulation adapters end to end ───────────────────────

#[test]
fn simulation_adapters_carry_a_full_exchange() {
    let config = test_config();
    let mut ports = Ports {
        clock: ManualClock::default(),
        peer: SerialLink::new(),
        control: WsControl::new(config.control_origin(), config.http_timeout_ms),
        backend: HttpEventClient::new(config.backend_origin(), config.http_timeout_ms),
    };
    ports.backend.set_associated(true);
    let mut sink = super::mock_ports::RecordingSink::default();
    let mut relay = Relay::new(&config, 0);

    relay.start(&mut ports, &mut sink);
    relay.run_iteration(&mut ports, &mut sink);
    assert_eq!(
        ports.control.sim_opened(),
        [format!("{}/ws/subscribe?deviceId=dev-001", config.control_origin())]
    );

    ports.control.sim_push_text(r#"{"type":"set_ai_mode","mode":"audio"}"#);
    ports
        .peer
        .sim_inject(b"{\"type\":\"face_detection\",\"timestamp\":3,\"data\":{\"detected\":true,\"count\":2}}\n");
    ports.clock.set(10);
    relay.run_iteration(&mut ports, &mut sink);

    let written = ports.peer.sim_take_written();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with(r#"{"type":"set_mode","timestamp":10,"data":{"mode":"audio"}}"#));

    let posts = ports.backend.sim_posts();
    assert_eq!(posts.len(), 2, "start heartbeat + face event");
    assert_eq!(posts[1].0, config.backend_url("/api/message"));
    assert!(posts[1].1.contains(r#""count":2"#));
}
