//! Network acquisition state machine.
//!
//! Owns the policy side of getting the device onto a network: join attempts
//! with elapsed-time retry, and the sticky access-point fallback after the
//! attempt budget is spent.  The mechanism side (radio, DHCP) lives behind
//! [`ConnectivityPort`]; on the host that port is a scriptable simulation.
//!
//! This machine is the **sole writer** of the connectivity and network
//! identity fields of the shared [`StatusRecord`].
//!
//! ```text
//!   Idle ──▶ Connecting ──▶ Connected
//!              │   ▲              │
//!              ▼   │ (interval)   ▼ (link drop)
//!          RetryWait          back to Idle
//!              │
//!              ▼ (attempts exhausted)
//!          ApFallback  — sticky until external reset
//! ```

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{ConnectivityPort, Credentials, EventSink};
use crate::config::SystemConfig;
use crate::status::{Connectivity, StatusRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetState {
    /// Not yet attempting; next evaluate starts an attempt.
    Idle,
    /// Join in flight; fails if the deadline passes without a link.
    Connecting { deadline_ms: u64 },
    /// Link up, address assigned.
    Connected,
    /// Waiting out the retry interval after a failed attempt.
    RetryWait { until_ms: u64 },
    /// Local AP running; no automatic retries.
    ApFallback,
}

/// Retry bookkeeping plus the machine state. Private to this module —
/// everything the rest of the system needs is in the status record.
pub struct NetAcquisition {
    state: NetState,
    credentials: Option<Credentials>,
    attempts: u8,
    retry_interval_ms: u64,
    max_attempts: u8,
    ap_ssid: heapless::String<32>,
    ap_password: heapless::String<64>,
}

impl NetAcquisition {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            state: NetState::Idle,
            credentials: None,
            attempts: 0,
            retry_interval_ms: config.wifi_retry_interval_ms as u64,
            max_attempts: config.max_connect_attempts,
            ap_ssid: config.ap_ssid.clone(),
            ap_password: config.ap_password.clone(),
        }
    }

    // ── External operations ───────────────────────────────────

    /// Boot entry point.  Absent or empty credentials skip the retry loop
    /// entirely and drop straight into AP fallback.
    pub fn start(
        &mut self,
        credentials: Option<Credentials>,
        port: &mut impl ConnectivityPort,
        status: &mut StatusRecord,
        sink: &mut impl EventSink,
    ) {
        match credentials {
            Some(c) if !c.ssid.is_empty() => {
                info!("net: stored credentials for '{}'", c.ssid);
                self.credentials = Some(c);
                self.state = NetState::Idle;
            }
            _ => {
                info!("net: no stored credentials");
                self.credentials = None;
                self.enter_ap_fallback(port, status, sink);
            }
        }
    }

    /// Install new credentials (from the provisioning endpoint) and restart
    /// acquisition from scratch.  Also the short-press reconnect path, which
    /// re-sends the stored credentials.
    pub fn reset(
        &mut self,
        credentials: Option<Credentials>,
        port: &mut impl ConnectivityPort,
        status: &mut StatusRecord,
        sink: &mut impl EventSink,
    ) {
        if self.state == NetState::ApFallback {
            port.stop_access_point();
        }
        port.disconnect();
        if let Some(c) = credentials {
            self.credentials = Some(c);
        }
        self.attempts = 0;
        self.state = NetState::Idle;
        self.transition(Connectivity::Disconnected, status, sink);
        status.clear_network_identity();
        info!("net: reset, retries re-enabled");
    }

    /// One evaluation pass.  Non-blocking; called every control-loop pass.
    pub fn evaluate(
        &mut self,
        now_ms: u64,
        port: &mut impl ConnectivityPort,
        status: &mut StatusRecord,
        sink: &mut impl EventSink,
    ) {
        port.poll();
        match self.state {
            NetState::Idle => self.initiate_connect(now_ms, port, status, sink),
            NetState::Connecting { deadline_ms } => {
                if port.is_connected() {
                    self.on_connected(port, status, sink);
                } else if now_ms >= deadline_ms {
                    self.on_attempt_failed(now_ms, port, status, sink);
                }
            }
            NetState::Connected => {
                if !port.is_connected() {
                    self.on_disconnected_observed(status, sink);
                }
            }
            NetState::RetryWait { until_ms } => {
                if now_ms >= until_ms {
                    self.initiate_connect(now_ms, port, status, sink);
                }
            }
            NetState::ApFallback => {} // sticky
        }
    }

    /// Whether the device currently holds a station link.
    pub fn is_connected(&self) -> bool {
        self.state == NetState::Connected
    }

    /// Whether the fallback access point is running.
    pub fn in_ap_mode(&self) -> bool {
        self.state == NetState::ApFallback
    }

    // ── Internal transitions ──────────────────────────────────

    fn initiate_connect(
        &mut self,
        now_ms: u64,
        port: &mut impl ConnectivityPort,
        status: &mut StatusRecord,
        sink: &mut impl EventSink,
    ) {
        let Some(creds) = self.credentials.as_ref() else {
            self.enter_ap_fallback(port, status, sink);
            return;
        };

        self.attempts += 1;
        info!(
            "net: join attempt {}/{} to '{}'",
            self.attempts, self.max_attempts, creds.ssid
        );
        match port.begin_join(&creds.ssid, &creds.password) {
            Ok(()) => {
                self.state = NetState::Connecting {
                    deadline_ms: now_ms + self.retry_interval_ms,
                };
                self.transition(Connectivity::Connecting, status, sink);
            }
            Err(e) => {
                warn!("net: join start failed: {e}");
                self.on_attempt_failed(now_ms, port, status, sink);
            }
        }
    }

    fn on_connected(
        &mut self,
        port: &mut impl ConnectivityPort,
        status: &mut StatusRecord,
        sink: &mut impl EventSink,
    ) {
        self.state = NetState::Connected;
        self.attempts = 0;
        let ssid: heapless::String<32> = port
            .ssid()
            .and_then(|s| heapless::String::try_from(s).ok())
            .unwrap_or_default();
        let ip = port.ip_address().unwrap_or_default();
        status.set_network_identity(&ssid, &ip);
        self.transition(Connectivity::Connected, status, sink);
        info!("net: connected to '{ssid}' at {ip}");
    }

    fn on_disconnected_observed(&mut self, status: &mut StatusRecord, sink: &mut impl EventSink) {
        warn!("net: link dropped");
        // A drop after a successful join starts a fresh attempt budget.
        self.attempts = 0;
        self.state = NetState::Idle;
        status.clear_network_identity();
        self.transition(Connectivity::Disconnected, status, sink);
    }

    fn on_attempt_failed(
        &mut self,
        now_ms: u64,
        port: &mut impl ConnectivityPort,
        status: &mut StatusRecord,
        sink: &mut impl EventSink,
    ) {
        warn!("net: attempt {} failed", self.attempts);
        port.disconnect();
        if self.attempts >= self.max_attempts {
            self.enter_ap_fallback(port, status, sink);
        } else {
            self.state = NetState::RetryWait {
                until_ms: now_ms + self.retry_interval_ms,
            };
            self.transition(Connectivity::Disconnected, status, sink);
        }
    }

    fn enter_ap_fallback(
        &mut self,
        port: &mut impl ConnectivityPort,
        status: &mut StatusRecord,
        sink: &mut impl EventSink,
    ) {
        self.state = NetState::ApFallback;
        status.clear_network_identity();
        match port.start_access_point(&self.ap_ssid, &self.ap_password) {
            Ok(()) => {
                self.transition(Connectivity::ApMode, status, sink);
                info!("net: fallback AP '{}' up", self.ap_ssid);
            }
            Err(e) => {
                // Radio refused even AP mode; nothing left to try.
                self.transition(Connectivity::Error, status, sink);
                warn!("net: AP start failed: {e}");
            }
        }
    }

    fn transition(
        &self,
        next: Connectivity,
        status: &mut StatusRecord,
        sink: &mut impl EventSink,
    ) {
        let from = status.connectivity();
        if from != next && status.set_connectivity(next) {
            sink.emit(&AppEvent::ConnectivityChanged { from, to: next });
        }
    }
}
