//! Outbound application events.
//!
//! The domain emits these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them — log to
//! serial, publish over MQTT, etc.

use crate::status::Connectivity;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Periodic status snapshot.
    Status(StatusSnapshot),

    /// The connectivity state changed.
    ConnectivityChanged {
        from: Connectivity,
        to: Connectivity,
    },

    /// A command was applied (after validation).
    CommandApplied {
        running: bool,
        position: u8,
    },

    /// A command was discarded (bad secret, unknown action).
    CommandDropped(&'static str),

    /// A deferred restore move fired.
    RestoreCompleted {
        position: u8,
    },

    /// The firmware has started.
    Started,
}

/// A point-in-time status snapshot suitable for logging or transmission.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub connectivity: Connectivity,
    pub network_name: heapless::String<32>,
    pub network_address: heapless::String<16>,
    pub servo_running: bool,
    pub servo_position: u8,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Disconnected,
            network_name: heapless::String::new(),
            network_address: heapless::String::new(),
            servo_running: false,
            servo_position: 0,
        }
    }
}
