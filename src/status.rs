//! Shared device status record.
//!
//! `StatusRecord` is the single shared mutable state describing connectivity
//! and servo status.  Created once at boot and alive for the process
//! lifetime; every core component reads it, but writes follow a strict
//! single-writer-per-field discipline:
//!
//! - connectivity + network identity: written only by the network
//!   acquisition state machine ([`crate::net`])
//! - servo running flag + position: written only by the command dispatcher
//!   ([`crate::app::service`])
//!
//! There is no lock — the control loop is cooperative and never preempts —
//! so safety rests on that discipline plus the validated mutation methods
//! below (range clamp, legal-transition check) instead of raw field writes.

use log::warn;

/// Enumerated network-join status of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Disconnected,
    Connecting,
    Connected,
    /// Local access-point fallback, sticky until an external reset.
    ApMode,
    Error,
}

impl Connectivity {
    /// Wire label used in status replies and publishes.
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ApMode => "ap",
            Self::Error => "error",
        }
    }
}

/// Maximum servo deflection in degrees.
pub const POSITION_MAX: u8 = 180;

/// The shared status record.  See module docs for the write discipline.
pub struct StatusRecord {
    connectivity: Connectivity,
    servo_running: bool,
    servo_position: u8,
    network_name: heapless::String<32>,
    network_address: heapless::String<16>,
}

impl StatusRecord {
    /// Boot-time record: disconnected, servo stopped at 0 degrees.
    pub fn new() -> Self {
        Self {
            connectivity: Connectivity::Disconnected,
            servo_running: false,
            servo_position: 0,
            network_name: heapless::String::new(),
            network_address: heapless::String::new(),
        }
    }

    // ── Reads ─────────────────────────────────────────────────

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn servo_running(&self) -> bool {
        self.servo_running
    }

    pub fn servo_position(&self) -> u8 {
        self.servo_position
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub fn network_address(&self) -> &str {
        &self.network_address
    }

    // ── Connectivity writes (network acquisition machine only) ─

    /// Apply a connectivity transition.  Illegal transitions are rejected
    /// with a warning and leave the record unchanged; same-state writes are
    /// accepted as no-ops.  Returns whether the record now holds `next`.
    pub fn set_connectivity(&mut self, next: Connectivity) -> bool {
        if next == self.connectivity {
            return true;
        }
        if !Self::transition_legal(self.connectivity, next) {
            warn!(
                "status: illegal connectivity transition {:?} -> {:?} ignored",
                self.connectivity, next
            );
            return false;
        }
        self.connectivity = next;
        true
    }

    /// Record the joined network's name and address.
    pub fn set_network_identity(&mut self, name: &str, address: &str) {
        self.network_name.clear();
        let _ = self.network_name.push_str(name);
        self.network_address.clear();
        let _ = self.network_address.push_str(address);
    }

    /// Clear the network identity (on disconnect or AP fallback).
    pub fn clear_network_identity(&mut self) {
        self.network_name.clear();
        self.network_address.clear();
    }

    // ── Servo writes (command dispatcher only) ────────────────

    pub fn set_servo_running(&mut self, running: bool) {
        self.servo_running = running;
    }

    /// Store a servo position, clamped into `[0, POSITION_MAX]`.
    /// Returns the value actually stored.
    pub fn set_servo_position(&mut self, position: i32) -> u8 {
        let clamped = position.clamp(0, i32::from(POSITION_MAX)) as u8;
        self.servo_position = clamped;
        clamped
    }

    // ── Internal ──────────────────────────────────────────────

    fn transition_legal(from: Connectivity, to: Connectivity) -> bool {
        use Connectivity::{ApMode, Connected, Connecting, Disconnected, Error};
        match from {
            Disconnected => matches!(to, Connecting | ApMode | Error),
            Connecting => matches!(to, Connected | Disconnected | ApMode | Error),
            Connected => matches!(to, Disconnected | Error),
            // AP fallback is sticky: only the external reset path may leave
            // it, and that path goes through Disconnected.
            ApMode => matches!(to, Disconnected),
            Error => matches!(to, Connecting | Disconnected | ApMode),
        }
    }
}
