//! Service-level tests: connection supervision, heartbeats, deadlines,
//! and resilience of the dispatch loop.

use crate::mock_ports::{BusOp, MockBus, MockClock, MockMonitor, MockTagReader, command_bytes};

use serde_json::json;
use tapreader::app::service::{Input, ReaderService};
use tapreader::config::DeviceConfig;
use tapreader::mode::Mode;
use tapreader::protocol::envelope::Envelope;
use tapreader::protocol::event::Delivery;

fn monitor() -> MockMonitor {
    MockMonitor { percent: 42.0 }
}

// ── Connection supervision ────────────────────────────────────

#[test]
fn on_connect_runs_presence_subscribe_status_mode_in_order() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();

    service.on_connect(&mut bus, &clock).unwrap();

    assert_eq!(
        bus.ops,
        vec![
            BusOp::Presence {
                topic: "devices/reader-001/status".into()
            },
            BusOp::Subscribe {
                filter: "devices/reader-001/#".into()
            },
            BusOp::Publish {
                topic: "devices/reader-001/status".into()
            },
            BusOp::Publish {
                topic: "devices/reader-001/mode".into()
            },
        ]
    );
}

#[test]
fn on_connect_announces_online_then_idle_with_empty_previous_mode() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();

    service.on_connect(&mut bus, &clock).unwrap();

    let status = bus.published[0].envelope();
    assert_eq!(status.event_type, "status_change");
    assert_eq!(status.payload["status"], "online");
    assert_eq!(status.payload["firmware_version"], env!("CARGO_PKG_VERSION"));
    assert!(bus.published[0].retained);

    let mode = bus.published[1].envelope();
    assert_eq!(mode.event_type, "mode_change");
    assert_eq!(mode.payload["mode"], "idle");
    assert_eq!(mode.payload["previous_mode"], "");
    assert_eq!(mode.request_id, "");
    assert!(bus.published[1].retained);
}

#[test]
fn presence_message_is_a_full_offline_status_envelope() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();

    service.on_connect(&mut bus, &clock).unwrap();

    let (topic, payload, retained) = bus.presence.clone().expect("presence registered");
    assert_eq!(topic, "devices/reader-001/status");
    assert!(retained);

    let env = Envelope::decode(&payload).unwrap();
    assert_eq!(env.event_type, "status_change");
    assert_eq!(env.payload["status"], "offline");
    assert_eq!(env.device_id, "reader-001");
}

// ── Malformed input ───────────────────────────────────────────

#[test]
fn undecodable_bytes_are_dropped_without_a_response() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);
    service.on_connect(&mut bus, &clock).unwrap();
    bus.published.clear();

    for bytes in [
        b"not json at all".to_vec(),
        b"[1, 2, 3]".to_vec(),
        br#"{"version": "1.0"}"#.to_vec(),
        Vec::new(),
    ] {
        service.step(Input::Message(bytes), &mut bus, &mut reader, &clock, &monitor());
    }

    assert!(bus.published.is_empty());
    assert_eq!(service.mode(), Mode::Idle);
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_fires_only_after_the_interval() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);
    service.on_connect(&mut bus, &clock).unwrap();
    bus.published.clear();

    clock.advance_secs(30);
    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());
    assert!(bus.published.is_empty());

    clock.advance_secs(31);
    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());

    assert_eq!(bus.event_types(), vec!["heartbeat"]);
    let record = &bus.published[0];
    assert_eq!(record.topic, "devices/reader-001/heartbeat");
    assert!(!record.retained);
    assert_eq!(record.delivery, Delivery::AtMostOnce);

    let env = record.envelope();
    assert_eq!(env.payload["uptime_seconds"], 61);
    assert_eq!(env.payload["operations_completed"], 0);
    assert!((env.payload["memory_usage_percent"].as_f64().unwrap() - 42.0).abs() < 1e-6);
}

#[test]
fn heartbeat_counts_accepted_commands_only() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);
    service.on_connect(&mut bus, &clock).unwrap();

    // Accepted.
    service.step(
        Input::Message(command_bytes("auth_start", "r1", json!({"timeout_seconds": 0}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    // Rejected: already busy.
    service.step(
        Input::Message(command_bytes("read_start", "r2", json!({"read_blocks": [1], "timeout_seconds": 0}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    // Unknown: dropped.
    service.step(
        Input::Message(command_bytes("mystery", "r3", json!({}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    // Accepted.
    service.step(
        Input::Message(command_bytes("reset", "r4", json!({}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );

    assert_eq!(service.operations_completed(), 2);

    bus.published.clear();
    clock.advance_secs(61);
    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());
    assert_eq!(bus.last().envelope().payload["operations_completed"], 2);
}

#[test]
fn heartbeat_is_suppressed_before_connect() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);

    clock.advance_secs(3600);
    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());
    assert!(bus.published.is_empty());
}

// ── Deadlines ─────────────────────────────────────────────────

#[test]
fn expired_operation_cancels_hardware_and_returns_to_idle() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);
    service.on_connect(&mut bus, &clock).unwrap();

    service.step(
        Input::Message(command_bytes("register_start", "r1", json!({
            "tag_uid": "04AB", "key": "k", "timeout_seconds": 5
        }))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    assert_eq!(service.mode(), Mode::Register);
    bus.published.clear();

    clock.advance_secs(4);
    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());
    assert!(bus.published.is_empty());
    assert_eq!(service.mode(), Mode::Register);

    clock.advance_secs(1);
    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());

    assert_eq!(bus.event_types(), vec!["error", "mode_change"]);
    let error = bus.published[0].envelope();
    assert_eq!(error.payload["error_code"], "timeout");
    assert_eq!(error.payload["retry_possible"], true);
    assert_eq!(error.payload["component"], "register");
    assert_eq!(error.request_id, "r1");

    let mode = bus.published[1].envelope();
    assert_eq!(mode.payload["mode"], "idle");
    assert_eq!(mode.payload["previous_mode"], "register");
    assert_eq!(service.mode(), Mode::Idle);
    assert_eq!(reader.cancels(), 1);
}

#[test]
fn timeout_fires_at_most_once() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);
    service.on_connect(&mut bus, &clock).unwrap();

    service.step(
        Input::Message(command_bytes("auth_start", "r1", json!({"timeout_seconds": 2}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    bus.published.clear();

    clock.advance_secs(3);
    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());
    let first = bus.published.len();
    assert!(first >= 2);

    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());
    assert_eq!(bus.published.len(), first);
    assert_eq!(reader.cancels(), 1);
}

#[test]
fn zero_timeout_means_wait_forever() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);
    service.on_connect(&mut bus, &clock).unwrap();

    service.step(
        Input::Message(command_bytes("auth_start", "r1", json!({"timeout_seconds": 0}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    bus.published.clear();

    clock.advance_secs(24 * 3600);
    service.step(Input::Tick, &mut bus, &mut reader, &clock, &monitor());

    assert_eq!(service.mode(), Mode::Auth);
    // Only the (now long overdue) heartbeat, never a timeout error.
    assert_eq!(bus.event_types(), vec!["heartbeat"]);
}

// ── Resilience ────────────────────────────────────────────────

#[test]
fn publish_failure_does_not_wedge_the_state_machine() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);
    service.on_connect(&mut bus, &clock).unwrap();
    bus.published.clear();

    bus.fail_publish = true;
    service.step(
        Input::Message(command_bytes("auth_start", "r1", json!({"timeout_seconds": 0}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    // State advanced even though the announcement was lost.
    assert_eq!(service.mode(), Mode::Auth);

    bus.fail_publish = false;
    service.step(
        Input::Message(command_bytes("reset", "r2", json!({}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    assert_eq!(service.mode(), Mode::Idle);
    assert_eq!(bus.event_types(), vec!["mode_change"]);
}

#[test]
fn published_timestamps_never_decrease_even_if_the_clock_does() {
    let mut service = ReaderService::new(DeviceConfig::default());
    let mut bus = MockBus::new();
    let clock = MockClock::new();
    let mut reader = MockTagReader::new(true);
    service.on_connect(&mut bus, &clock).unwrap();

    service.step(
        Input::Message(command_bytes("auth_start", "r1", json!({"timeout_seconds": 0}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );
    clock.rewind_secs(120);
    service.step(
        Input::Message(command_bytes("reset", "r2", json!({}))),
        &mut bus,
        &mut reader,
        &clock,
        &monitor(),
    );

    let stamps: Vec<String> = bus.published.iter().map(|r| r.envelope().timestamp).collect();
    let mut sorted = stamps.clone();
    sorted.sort();
    assert_eq!(stamps, sorted);
}
