//! Integration tests for the backend control channel: connection state
//! machine, reconnect backoff and command translation.

use serde_json::json;

use super::mock_ports::{Harness, MockControl};

use tbao_bridge::app::control::ControlState;
use tbao_bridge::app::events::BridgeEvent;
use tbao_bridge::app::ports::{ChannelError, ControlEvent};
use tbao_bridge::error::{Error, ParseErrorKind};

fn connected_harness() -> Harness {
    let mut h = Harness::new();
    h.step_at(0);
    h.step_at(1);
    assert_eq!(h.relay.control().state(), ControlState::Connected);
    h.sink.clear();
    h
}

fn channel_faults(h: &Harness) -> Vec<ChannelError> {
    h.sink
        .events
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::Fault(Error::Channel(c)) => Some(*c),
            _ => None,
        })
        .collect()
}

// ── Connection lifecycle ──────────────────────────────────────

#[test]
fn first_iteration_opens_the_subscribe_path() {
    let mut h = Harness::new();
    h.step_at(0);
    assert_eq!(h.ports.control.opened, ["/ws/subscribe?deviceId=dev-001"]);
    assert_eq!(h.relay.control().state(), ControlState::Connecting);
    assert_eq!(h.sink.events, [BridgeEvent::ControlConnecting]);

    h.step_at(1);
    assert_eq!(h.relay.control().state(), ControlState::Connected);
    assert_eq!(h.sink.count(|e| *e == BridgeEvent::ControlConnected), 1);
}

#[test]
fn connecting_sends_nothing_to_the_peer() {
    let h = connected_harness();
    assert!(h.ports.peer.written.is_empty());
    assert!(h.ports.backend.posts.is_empty());
}

#[test]
fn duplicate_connected_events_are_collapsed() {
    let mut h = connected_harness();
    h.ports.control.push_event(ControlEvent::Connected);
    h.step_at(2);
    assert_eq!(h.sink.count(|e| *e == BridgeEvent::ControlConnected), 0);
}

#[test]
fn drop_reconnects_after_the_backoff() {
    let mut h = connected_harness();
    h.ports.control.push_event(ControlEvent::Disconnected);
    h.step_at(1_000);
    assert_eq!(h.relay.control().state(), ControlState::Disconnected);
    assert_eq!(channel_faults(&h), [ChannelError::Disconnected]);
    assert_eq!(h.ports.control.opened.len(), 1);

    h.step_at(3_999);
    assert_eq!(h.ports.control.opened.len(), 1);

    h.step_at(4_000);
    assert_eq!(h.ports.control.opened.len(), 2);
    assert_eq!(h.relay.control().state(), ControlState::Connecting);

    h.step_at(4_001);
    assert_eq!(h.relay.control().state(), ControlState::Connected);
}

#[test]
fn failed_open_retries_after_the_backoff() {
    let mut h = Harness::new();
    h.ports.control.fail_open = true;
    h.step_at(0);
    assert_eq!(channel_faults(&h), [ChannelError::OpenFailed]);
    assert_eq!(h.relay.control().state(), ControlState::Disconnected);

    h.step_at(2_999);
    assert_eq!(h.ports.control.opened.len(), 1);

    h.ports.control.fail_open = false;
    h.step_at(3_000);
    assert_eq!(h.ports.control.opened.len(), 2);
}

#[test]
fn stalled_connect_times_out_and_closes() {
    let mut h = Harness::new();
    h.ports.control = MockControl::default();
    h.step_at(0);
    h.step_at(10_000);
    assert_eq!(h.relay.control().state(), ControlState::Connecting);

    h.step_at(10_001);
    assert_eq!(h.ports.control.closes, 1);
    assert_eq!(channel_faults(&h), [ChannelError::ConnectTimeout]);

    h.step_at(13_000);
    assert_eq!(h.ports.control.opened.len(), 1);
    h.step_at(13_001);
    assert_eq!(h.ports.control.opened.len(), 2);
}

#[test]
fn frames_before_connected_are_ignored() {
    let mut h = Harness::new();
    h.ports.control = MockControl::default();
    h.step_at(0);
    h.ports.control.push_text(r#"{"type":"capture_image"}"#);
    h.step_at(1);
    assert!(h.ports.peer.written.is_empty());
    assert_eq!(h.relay.pending_len(), 0);
}

// ── Command translation ───────────────────────────────────────

#[test]
fn set_ai_mode_becomes_one_set_mode_directive() {
    let mut h = connected_harness();
    h.ports.control.push_text(r#"{"type":"set_ai_mode","mode":"audio"}"#);
    h.step_at(2);

    assert_eq!(h.ports.peer.written_kinds(), ["set_mode"]);
    assert_eq!(h.ports.peer.written_data(), [json!({"mode": "audio"})]);
}

#[test]
fn action_commands_carry_empty_payloads() {
    let mut h = connected_harness();
    for frame in [
        r#"{"type":"capture_image"}"#,
        r#"{"type":"start_audio"}"#,
        r#"{"type":"stop_audio","extra":1}"#,
    ] {
        h.ports.control.push_text(frame);
    }
    h.step_at(2);

    assert_eq!(h.ports.peer.written_kinds(), ["capture_image", "start_audio", "stop_audio"]);
    assert!(h.ports.peer.written_data().iter().all(|d| *d == json!({})));
}

#[test]
fn bad_frames_are_dropped_without_tearing_down() {
    let mut h = connected_harness();
    h.ports.control.push_text("{not json");
    h.ports.control.push_text(r#"{"type":"reboot"}"#);
    h.ports.control.push_text(r#"{"type":"set_ai_mode"}"#);
    h.ports.control.push_text(r#"{"type":"capture_image"}"#);
    h.step_at(2);

    let kinds: Vec<ParseErrorKind> = h
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::Fault(Error::Parse(p)) => Some(p.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        [
            ParseErrorKind::InvalidJson,
            ParseErrorKind::UnknownType,
            ParseErrorKind::MissingField("mode"),
        ]
    );
    assert_eq!(h.relay.control().state(), ControlState::Connected);
    assert_eq!(h.ports.control.closes, 0);
    assert_eq!(h.ports.peer.written_kinds(), ["capture_image"]);
}

#[test]
fn backend_notices_are_observed_not_forwarded() {
    let mut h = connected_harness();
    h.ports.control.push_text(r#"{"kind":"greeting","text":"hi dev-001"}"#);
    h.step_at(2);

    assert!(h.sink.events.contains(&BridgeEvent::ControlNotice {
        kind: "greeting".into(),
        text: "hi dev-001".into(),
    }));
    assert!(h.ports.peer.written.is_empty());
}
