//! Integration tests: command channels → dispatcher → actuator, and the
//! network acquisition machine driven through a scripted radio.

#![cfg(not(target_os = "espidf"))]

use servolink::app::commands::CommandSource;
use servolink::app::events::AppEvent;
use servolink::app::ports::{
    ActuatorPort, ConnectivityError, ConnectivityPort, Credentials, EventSink,
};
use servolink::app::service::DeviceService;
use servolink::channels::{self, http, mqtt};
use servolink::config::SystemConfig;
use servolink::net::NetAcquisition;
use servolink::status::Connectivity;

// ── Mock implementations ──────────────────────────────────────

struct MockServo {
    moves: Vec<u8>,
}
impl MockServo {
    fn new() -> Self {
        Self { moves: Vec::new() }
    }
}
impl ActuatorPort for MockServo {
    fn attach(&mut self, _pin: i32) {}
    fn move_to(&mut self, angle: u8) {
        self.moves.push(angle);
    }
}

struct CollectingSink {
    events: Vec<AppEvent>,
}
impl CollectingSink {
    fn new() -> Self {
        Self { events: Vec::new() }
    }
    fn saw_restore_to(&self, position: u8) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, AppEvent::RestoreCompleted { position: p } if *p == position))
    }
}
impl EventSink for CollectingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

/// Radio whose join outcome is scripted per test.
struct ScriptedRadio {
    /// Joins left that fail outright when initiated.
    failing_joins: usize,
    /// Whether a successful join ever reaches link-up.
    reachable: bool,
    joined: bool,
    connected: bool,
    ap_active: bool,
    join_calls: usize,
}
impl ScriptedRadio {
    fn reachable() -> Self {
        Self {
            failing_joins: 0,
            reachable: true,
            joined: false,
            connected: false,
            ap_active: false,
            join_calls: 0,
        }
    }
    fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::reachable()
        }
    }
}
impl ConnectivityPort for ScriptedRadio {
    fn begin_join(&mut self, _ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        self.join_calls += 1;
        if self.failing_joins > 0 {
            self.failing_joins -= 1;
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.joined = true;
        Ok(())
    }
    fn poll(&mut self) {
        if self.joined && self.reachable {
            self.connected = true;
        }
    }
    fn is_connected(&self) -> bool {
        self.connected
    }
    fn disconnect(&mut self) {
        self.joined = false;
        self.connected = false;
    }
    fn start_access_point(&mut self, _ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        self.ap_active = true;
        Ok(())
    }
    fn stop_access_point(&mut self) {
        self.ap_active = false;
    }
    fn ssid(&self) -> Option<&str> {
        self.connected.then_some("HomeNet")
    }
    fn ip_address(&self) -> Option<heapless::String<16>> {
        self.connected
            .then(|| heapless::String::try_from("10.0.0.7").ok())
            .flatten()
    }
}

fn creds() -> Credentials {
    Credentials::new("HomeNet", "hunter22").unwrap()
}

// ── Command flow ──────────────────────────────────────────────

#[test]
fn http_start_command_drives_the_sweep() {
    let mut svc = DeviceService::new(SystemConfig::default());
    let mut servo = MockServo::new();
    let mut sink = CollectingSink::new();

    let cmd = channels::decode_command(r#"{"command":"start"}"#).unwrap();
    assert!(svc.handle_command(&cmd, CommandSource::Request, 0, &mut servo, &mut sink));
    assert!(svc.status().servo_running());

    // Sweep toggles 0 ↔ 180 at the configured interval.
    svc.tick(2_000, &mut servo, &mut sink);
    svc.tick(3_000, &mut servo, &mut sink);
    svc.tick(4_000, &mut servo, &mut sink);
    assert_eq!(servo.moves, vec![180, 0]);
}

#[test]
fn temporary_move_restores_prior_position_after_travel_estimate() {
    let mut svc = DeviceService::new(SystemConfig::default());
    let mut servo = MockServo::new();
    let mut sink = CollectingSink::new();

    // Park at 180 first (plain move, no restore).
    let park = channels::decode_command(r#"{"command":"position","position":180}"#).unwrap();
    svc.handle_command(&park, CommandSource::Request, 0, &mut servo, &mut sink);

    // Temporary move to 20: 160° of travel → 266 ms + 500 ms settle.
    let temp =
        channels::decode_command(r#"{"command":"position","position":20,"restore":1}"#).unwrap();
    svc.handle_command(&temp, CommandSource::Request, 10_000, &mut servo, &mut sink);
    assert!(svc.restore_pending());

    svc.tick(10_765, &mut servo, &mut sink);
    assert!(svc.restore_pending(), "restore must not fire early");
    svc.tick(10_766, &mut servo, &mut sink);
    assert!(!svc.restore_pending());
    assert_eq!(servo.moves, vec![180, 20, 180]);
    assert!(sink.saw_restore_to(180));
}

#[test]
fn new_position_supersedes_a_pending_restore() {
    let mut svc = DeviceService::new(SystemConfig::default());
    let mut servo = MockServo::new();
    let mut sink = CollectingSink::new();

    let park = channels::decode_command(r#"{"command":"position","position":180}"#).unwrap();
    svc.handle_command(&park, CommandSource::Request, 0, &mut servo, &mut sink);
    let temp =
        channels::decode_command(r#"{"command":"position","position":20,"restore":1}"#).unwrap();
    svc.handle_command(&temp, CommandSource::Request, 1_000, &mut servo, &mut sink);

    // A plain move lands before the restore fires.
    let plain = channels::decode_command(r#"{"command":"position","position":90}"#).unwrap();
    svc.handle_command(&plain, CommandSource::Request, 1_100, &mut servo, &mut sink);
    assert!(!svc.restore_pending());

    svc.tick(1_000_000, &mut servo, &mut sink);
    assert_eq!(servo.moves, vec![180, 20, 90]);
    assert_eq!(svc.status().servo_position(), 90);
}

#[test]
fn sweep_holds_while_a_restore_is_pending() {
    let mut svc = DeviceService::new(SystemConfig::default());
    let mut servo = MockServo::new();
    let mut sink = CollectingSink::new();

    let temp =
        channels::decode_command(r#"{"command":"position","position":90,"restore":1}"#).unwrap();
    svc.handle_command(&temp, CommandSource::Request, 0, &mut servo, &mut sink);

    // Start while the restore is still armed: running, but no sweep yet.
    let start = channels::decode_command(r#"{"command":"start"}"#).unwrap();
    svc.handle_command(&start, CommandSource::Request, 100, &mut servo, &mut sink);
    assert!(svc.restore_pending());

    // No sweep motion before the restore fires, even past the interval.
    svc.tick(600, &mut servo, &mut sink);
    assert_eq!(servo.moves, vec![90]);

    svc.tick(2_200, &mut servo, &mut sink); // restore (due 650 ms) fires, sweep resumes
    assert!(!svc.restore_pending());
    let moves_after_restore = servo.moves.len();

    svc.tick(5_000, &mut servo, &mut sink);
    assert_eq!(servo.moves.len(), moves_after_restore + 1);
}

#[test]
fn bus_commands_require_the_stored_secret() {
    let mut svc = DeviceService::new(SystemConfig::default());
    svc.set_auth_token("tok-123");
    let mut servo = MockServo::new();
    let mut sink = CollectingSink::new();

    let bad = mqtt::decode_bus_command(br#"{"command":"start","pwd":"wrong"}"#).unwrap();
    assert!(!svc.handle_command(&bad, CommandSource::Bus, 0, &mut servo, &mut sink));
    assert!(!svc.status().servo_running());

    let good = mqtt::decode_bus_command(br#"{"command":"start","pwd":"tok-123"}"#).unwrap();
    assert!(svc.handle_command(&good, CommandSource::Bus, 0, &mut servo, &mut sink));
    assert!(svc.status().servo_running());
}

// ── Network acquisition ───────────────────────────────────────

#[test]
fn acquisition_reaches_connected_and_records_identity() {
    let config = SystemConfig::default();
    let mut svc = DeviceService::new(config.clone());
    let mut radio = ScriptedRadio::reachable();
    let mut sink = CollectingSink::new();
    let mut net = NetAcquisition::new(&config);

    net.start(Some(creds()), &mut radio, svc.status_mut(), &mut sink);
    net.evaluate(0, &mut radio, svc.status_mut(), &mut sink);
    assert_eq!(svc.status().connectivity(), Connectivity::Connecting);
    net.evaluate(100, &mut radio, svc.status_mut(), &mut sink);

    assert_eq!(svc.status().connectivity(), Connectivity::Connected);
    assert_eq!(svc.status().network_name(), "HomeNet");
    assert_eq!(svc.status().network_address(), "10.0.0.7");
}

#[test]
fn exhausted_retries_fall_back_to_a_sticky_access_point() {
    let config = SystemConfig::default();
    let mut svc = DeviceService::new(config.clone());
    let mut radio = ScriptedRadio::unreachable();
    let mut sink = CollectingSink::new();
    let mut net = NetAcquisition::new(&config);

    net.start(Some(creds()), &mut radio, svc.status_mut(), &mut sink);
    for t in (0..200_000u64).step_by(1_000) {
        net.evaluate(t, &mut radio, svc.status_mut(), &mut sink);
    }

    assert_eq!(svc.status().connectivity(), Connectivity::ApMode);
    assert!(radio.ap_active);
    assert_eq!(
        radio.join_calls,
        config.max_connect_attempts as usize,
        "fallback must be sticky — no joins after AP mode"
    );
}

#[test]
fn reset_leaves_ap_mode_and_restarts_the_join_budget() {
    let config = SystemConfig::default();
    let mut svc = DeviceService::new(config.clone());
    let mut radio = ScriptedRadio::unreachable();
    let mut sink = CollectingSink::new();
    let mut net = NetAcquisition::new(&config);

    net.start(Some(creds()), &mut radio, svc.status_mut(), &mut sink);
    for t in (0..200_000u64).step_by(1_000) {
        net.evaluate(t, &mut radio, svc.status_mut(), &mut sink);
    }
    assert!(net.in_ap_mode());

    // New credentials arrive: machine leaves AP and tries again.
    radio.reachable = true;
    net.reset(Some(creds()), &mut radio, svc.status_mut(), &mut sink);
    assert!(!radio.ap_active);
    net.evaluate(300_000, &mut radio, svc.status_mut(), &mut sink);
    net.evaluate(300_100, &mut radio, svc.status_mut(), &mut sink);
    assert_eq!(svc.status().connectivity(), Connectivity::Connected);
}

// ── Wire formats ──────────────────────────────────────────────

#[test]
fn status_reply_mirrors_the_snapshot() {
    let config = SystemConfig::default();
    let mut svc = DeviceService::new(config.clone());
    let mut radio = ScriptedRadio::reachable();
    let mut sink = CollectingSink::new();
    let mut net = NetAcquisition::new(&config);
    net.start(Some(creds()), &mut radio, svc.status_mut(), &mut sink);
    net.evaluate(0, &mut radio, svc.status_mut(), &mut sink);
    net.evaluate(100, &mut radio, svc.status_mut(), &mut sink);

    let reply = http::status_reply(&svc.snapshot());
    assert_eq!(reply.status, 200);
    assert!(reply.body.contains(r#""wifi_ssid":"HomeNet""#));
    assert!(reply.body.contains(r#""wifi_ip":"10.0.0.7""#));
    assert!(reply.body.contains(r#""is_running":false"#));
    assert!(reply.body.contains(r#""servo_position":0"#));
}

#[test]
fn bus_status_payload_is_compact() {
    let mut svc = DeviceService::new(SystemConfig::default());
    let mut servo = MockServo::new();
    let mut sink = CollectingSink::new();
    let cmd = channels::decode_command(r#"{"command":"position","position":135}"#).unwrap();
    svc.handle_command(&cmd, CommandSource::Request, 0, &mut servo, &mut sink);

    assert_eq!(
        mqtt::status_payload(&svc.snapshot()),
        r#"{"running":false,"position":135}"#
    );
}
