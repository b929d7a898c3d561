//! Device service — the hexagonal core.
//!
//! [`DeviceService`] owns the shared [`StatusRecord`] and applies validated
//! commands to it: start/stop of the autonomous sweep, temporary moves with
//! a deferred restore, and the periodic sweep itself.  All I/O flows
//! through port traits injected at call sites, making the whole service
//! testable with mock adapters.
//!
//! ```text
//!  PendingCommand ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                     │      DeviceService        │
//!    ActuatorPort ◀── │ StatusRecord · restore    │
//!                     └──────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::SystemConfig;
use crate::status::{POSITION_MAX, StatusRecord};

use super::commands::{CommandAction, CommandSource, PendingCommand};
use super::events::{AppEvent, StatusSnapshot};
use super::ports::{ActuatorPort, EventSink};

// ───────────────────────────────────────────────────────────────
// DeviceService
// ───────────────────────────────────────────────────────────────

/// A scheduled "move back to the prior position" action.
#[derive(Debug, Clone, Copy)]
struct PendingRestore {
    position: u8,
    due_ms: u64,
}

/// The device service orchestrates all actuator-side domain logic.
pub struct DeviceService {
    status: StatusRecord,
    config: SystemConfig,
    /// Token required on bus-channel commands. Empty until provisioned.
    auth_token: heapless::String<64>,
    pending_restore: Option<PendingRestore>,
    last_sweep_ms: u64,
    sweep_high: bool,
}

impl DeviceService {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            status: StatusRecord::new(),
            config,
            auth_token: heapless::String::new(),
            pending_restore: None,
            last_sweep_ms: 0,
            sweep_high: false,
        }
    }

    /// Install the bus-channel authorization token (loaded from storage at
    /// boot, or updated after provisioning).
    pub fn set_auth_token(&mut self, token: &str) {
        self.auth_token.clear();
        // Oversized tokens can only come from a corrupted store; treat as
        // unprovisioned rather than propagate.
        if self.auth_token.push_str(token).is_err() {
            warn!("auth token too long, treating as unset");
            self.auth_token.clear();
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Validate and apply one command. Returns `true` when the command
    /// changed (or legitimately re-asserted) device state — the request
    /// channel maps `false` to an error reply, the bus channel stays silent.
    pub fn handle_command(
        &mut self,
        cmd: &PendingCommand,
        source: CommandSource,
        now_ms: u64,
        actuator: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if source == CommandSource::Bus && !self.authorized(cmd) {
            warn!("bus command dropped: bad secret");
            sink.emit(&AppEvent::CommandDropped("bad secret"));
            return false;
        }

        let action = match cmd.action {
            Some(a) => a,
            None => {
                sink.emit(&AppEvent::CommandDropped("unknown action"));
                return false;
            }
        };

        match action {
            CommandAction::Start => {
                self.status.set_servo_running(true);
                self.last_sweep_ms = now_ms;
                info!("sweep started");
            }
            CommandAction::Stop => {
                self.status.set_servo_running(false);
                info!("sweep stopped");
            }
            CommandAction::SetPosition => {
                let target = match cmd.target_position {
                    Some(t) => t,
                    None => {
                        sink.emit(&AppEvent::CommandDropped("position missing"));
                        return false;
                    }
                };
                self.apply_set_position(target, cmd.restore, now_ms, actuator);
            }
        }

        sink.emit(&AppEvent::CommandApplied {
            running: self.status.servo_running(),
            position: self.status.servo_position(),
        });
        true
    }

    fn authorized(&self, cmd: &PendingCommand) -> bool {
        let supplied = cmd.supplied_secret.as_deref().unwrap_or("");
        supplied == self.auth_token.as_str()
    }

    /// Temporary-move semantics: autonomous motion always stops first, the
    /// prior position is captured *before* the move, and the restore (if
    /// requested) is scheduled rather than waited for.  A new SetPosition
    /// supersedes any restore still pending.
    fn apply_set_position(
        &mut self,
        target: i32,
        restore: bool,
        now_ms: u64,
        actuator: &mut impl ActuatorPort,
    ) {
        let prior = self.status.servo_position();
        self.status.set_servo_running(false);
        self.pending_restore = None;

        let applied = self.status.set_servo_position(target);
        actuator.move_to(applied);

        if restore {
            let due_ms = now_ms + self.move_duration_ms(prior, applied);
            self.pending_restore = Some(PendingRestore {
                position: prior,
                due_ms,
            });
            info!("moved to {applied}, restore to {prior} in {} ms", due_ms - now_ms);
        } else {
            info!("moved to {applied}");
        }
    }

    /// Travel estimate for a move of `|to - from|` degrees plus a fixed
    /// settle margin. The hardware gives no completion signal.
    fn move_duration_ms(&self, from: u8, to: u8) -> u64 {
        let delta = from.abs_diff(to) as u64;
        delta * self.config.servo_full_travel_ms as u64 / POSITION_MAX as u64
            + self.config.restore_settle_ms as u64
    }

    // ── Per-pass orchestration ────────────────────────────────

    /// Advance time-driven behavior: fire a due restore, then step the
    /// autonomous sweep.  Called once per control-loop pass.
    pub fn tick(&mut self, now_ms: u64, actuator: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        if let Some(restore) = self.pending_restore {
            if now_ms >= restore.due_ms {
                self.pending_restore = None;
                let applied = self.status.set_servo_position(restore.position as i32);
                actuator.move_to(applied);
                sink.emit(&AppEvent::RestoreCompleted { position: applied });
                info!("restored position {applied}");
            }
        }

        // Sweep only while no restore is in flight — a restore landing
        // mid-sweep would otherwise be overwritten before it fires.
        if self.status.servo_running()
            && self.pending_restore.is_none()
            && now_ms.saturating_sub(self.last_sweep_ms) >= self.config.sweep_interval_ms as u64
        {
            self.last_sweep_ms = now_ms;
            self.sweep_high = !self.sweep_high;
            let target = if self.sweep_high { POSITION_MAX } else { 0 };
            let applied = self.status.set_servo_position(target as i32);
            actuator.move_to(applied);
        }
    }

    /// Periodic publish: emit the status snapshot through the sink and hand
    /// it back for transmission on the bus channel.
    pub fn publish(&self, sink: &mut impl EventSink) -> StatusSnapshot {
        let snapshot = self.snapshot();
        sink.emit(&AppEvent::Status(snapshot.clone()));
        snapshot
    }

    // ── Queries ───────────────────────────────────────────────

    /// Point-in-time snapshot for logging or transmission.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connectivity: self.status.connectivity(),
            network_name: heapless::String::try_from(self.status.network_name())
                .unwrap_or_default(),
            network_address: heapless::String::try_from(self.status.network_address())
                .unwrap_or_default(),
            servo_running: self.status.servo_running(),
            servo_position: self.status.servo_position(),
        }
    }

    /// Shared status record (read side).
    pub fn status(&self) -> &StatusRecord {
        &self.status
    }

    /// Mutable status record — connectivity fields are written exclusively
    /// by the network acquisition machine through this accessor.
    pub fn status_mut(&mut self) -> &mut StatusRecord {
        &mut self.status
    }

    /// Whether a restore action is scheduled but not yet fired.
    pub fn restore_pending(&self) -> bool {
        self.pending_restore.is_some()
    }

    /// Live configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}
