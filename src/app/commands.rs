//! Inbound commands to the command dispatcher.
//!
//! These represent actuator actions requested by the outside world (HTTP
//! control endpoint, MQTT command topic) that the
//! [`DeviceService`](super::service::DeviceService) validates and applies.

/// Which channel a command arrived on. The message-bus channel requires
/// authorization; the request channel is trusted (local network, replies
/// carry the outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// HTTP request/response channel.
    Request,
    /// MQTT publish/subscribe channel.
    Bus,
}

/// The actuator action being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Begin autonomous sweeping. Position untouched.
    Start,
    /// Stop autonomous sweeping.
    Stop,
    /// Move to a target angle, optionally restoring the prior position
    /// after the estimated travel time.
    SetPosition,
}

/// A decoded, not-yet-applied command. Transient — never persisted.
#[derive(Debug, Clone, Default)]
pub struct PendingCommand {
    pub action: Option<CommandAction>,
    /// Raw requested angle; the dispatcher clamps it.
    pub target_position: Option<i32>,
    /// Restore-after-move protocol requested.
    pub restore: bool,
    /// Secret supplied on the bus channel; compared to the stored token.
    pub supplied_secret: Option<heapless::String<64>>,
}

impl PendingCommand {
    /// A command with no recognised action — applied as a no-op.
    pub fn noop() -> Self {
        Self::default()
    }
}
