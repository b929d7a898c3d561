//! Command channels — HTTP request/response and MQTT publish/subscribe.
//!
//! Both channels speak the same JSON command envelope and hand decoded
//! commands to the main loop through [`ChannelShared`].  The channels
//! differ only in their failure contract: HTTP answers every request with
//! a structured `{success, message, data}` body and a 2xx/4xx status
//! class, while the bus channel has no reply path and drops undecodable
//! or unauthorized messages silently.
//!
//! Decode and encode are pure functions, fully covered by host tests; the
//! ESP-IDF server/client glue lives behind `target_os = "espidf"` gates in
//! the submodules.

pub mod http;
pub mod mqtt;

use serde::{Deserialize, Serialize};

use crate::app::commands::{CommandAction, CommandSource, PendingCommand};
use crate::app::events::StatusSnapshot;
use crate::app::ports::Credentials;
use crate::config::SystemConfig;
use crate::error::CommandError;

// ───────────────────────────────────────────────────────────────
// Wire command envelope (shared by both channels)
// ───────────────────────────────────────────────────────────────

/// Inbound command JSON: `{"command": "start"|"stop"|"position",
/// "position": <int>, "restore": 0|1, "pwd": "<secret>"}`.
/// Every field is optional; unknown `command` values decode to a no-op.
#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    #[serde(default)]
    command: Option<heapless::String<16>>,
    #[serde(default)]
    position: Option<i32>,
    #[serde(default)]
    restore: Option<i32>,
    #[serde(default)]
    pwd: Option<heapless::String<64>>,
}

/// Decode a command payload.  `Err` only on malformed JSON — an unknown
/// action is a valid envelope that the dispatcher treats as a no-op.
pub fn decode_command(payload: &str) -> Result<PendingCommand, CommandError> {
    let env: CommandEnvelope =
        serde_json::from_str(payload).map_err(|_| CommandError::MalformedPayload)?;
    let action = env.command.as_deref().and_then(|c| match c {
        "start" => Some(CommandAction::Start),
        "stop" => Some(CommandAction::Stop),
        "position" => Some(CommandAction::SetPosition),
        _ => None,
    });
    Ok(PendingCommand {
        action,
        target_position: env.position,
        restore: env.restore == Some(1),
        supplied_secret: env.pwd,
    })
}

// ───────────────────────────────────────────────────────────────
// Reply envelope (HTTP only)
// ───────────────────────────────────────────────────────────────

/// Structured reply body: `{"success": bool, "data": {...}, "message": str}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: &'static str,
}

impl ApiResponse<()> {
    pub fn ok(message: &'static str) -> Self {
        Self {
            success: true,
            data: None,
            message,
        }
    }

    pub fn error(message: &'static str) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok_with(data: T, message: &'static str) -> Self {
        Self {
            success: true,
            data: Some(data),
            message,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"success":false,"message":"encode error"}"#.to_string())
    }
}

// ───────────────────────────────────────────────────────────────
// Shared channel state
// ───────────────────────────────────────────────────────────────

/// Mailbox between the channel threads and the main loop.
///
/// Channel glue pushes decoded requests in; the main loop drains them each
/// pass (holding the surrounding mutex only briefly) and mirrors a fresh
/// status snapshot back for read-only endpoints.
pub struct ChannelShared {
    snapshot: StatusSnapshot,
    commands: heapless::Deque<(PendingCommand, CommandSource), 8>,
    credential_update: Option<Credentials>,
    credential_clear: bool,
    active_config: SystemConfig,
    config_update: Option<SystemConfig>,
}

impl ChannelShared {
    pub fn new() -> Self {
        Self {
            snapshot: StatusSnapshot::default(),
            commands: heapless::Deque::new(),
            credential_update: None,
            credential_clear: false,
            active_config: SystemConfig::default(),
            config_update: None,
        }
    }

    /// Queue an inbound command.  Returns `false` when the mailbox is full
    /// (command dropped — the device is already behind).
    pub fn push_command(&mut self, cmd: PendingCommand, source: CommandSource) -> bool {
        self.commands.push_back((cmd, source)).is_ok()
    }

    pub fn pop_command(&mut self) -> Option<(PendingCommand, CommandSource)> {
        self.commands.pop_front()
    }

    pub fn set_credential_update(&mut self, credentials: Credentials) {
        self.credential_update = Some(credentials);
    }

    pub fn take_credential_update(&mut self) -> Option<Credentials> {
        self.credential_update.take()
    }

    pub fn request_credential_clear(&mut self) {
        self.credential_clear = true;
    }

    pub fn take_credential_clear(&mut self) -> bool {
        core::mem::take(&mut self.credential_clear)
    }

    /// Main loop mirrors the latest status here after each pass.
    pub fn update_snapshot(&mut self, snapshot: StatusSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    /// Set once at boot so the config endpoint can serve the running values.
    pub fn set_active_config(&mut self, config: SystemConfig) {
        self.active_config = config;
    }

    pub fn active_config(&self) -> &SystemConfig {
        &self.active_config
    }

    pub fn set_config_update(&mut self, config: SystemConfig) {
        self.config_update = Some(config);
    }

    pub fn take_config_update(&mut self) -> Option<SystemConfig> {
        self.config_update.take()
    }
}

impl Default for ChannelShared {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_full_envelope() {
        let cmd =
            decode_command(r#"{"command":"position","position":90,"restore":1,"pwd":"s3cret"}"#)
                .unwrap();
        assert_eq!(cmd.action, Some(CommandAction::SetPosition));
        assert_eq!(cmd.target_position, Some(90));
        assert!(cmd.restore);
        assert_eq!(cmd.supplied_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn decode_start_stop() {
        assert_eq!(
            decode_command(r#"{"command":"start"}"#).unwrap().action,
            Some(CommandAction::Start)
        );
        assert_eq!(
            decode_command(r#"{"command":"stop"}"#).unwrap().action,
            Some(CommandAction::Stop)
        );
    }

    #[test]
    fn unknown_command_decodes_to_noop() {
        let cmd = decode_command(r#"{"command":"reboot"}"#).unwrap();
        assert_eq!(cmd.action, None);
    }

    #[test]
    fn restore_is_only_set_by_literal_one() {
        assert!(!decode_command(r#"{"command":"position","position":5}"#).unwrap().restore);
        assert!(!decode_command(r#"{"command":"position","restore":0}"#).unwrap().restore);
        assert!(decode_command(r#"{"command":"position","restore":1}"#).unwrap().restore);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert_eq!(
            decode_command("{not json").unwrap_err(),
            CommandError::MalformedPayload
        );
    }

    #[test]
    fn response_envelope_shape() {
        let json = ApiResponse::ok("done").to_json();
        assert!(json.contains(r#""success":true"#));
        assert!(json.contains(r#""message":"done""#));
        assert!(!json.contains("data"));

        let json = ApiResponse::error("bad").to_json();
        assert!(json.contains(r#""success":false"#));
    }

    #[test]
    fn config_update_is_taken_once() {
        let mut shared = ChannelShared::new();
        assert!(shared.take_config_update().is_none());

        let mut config = SystemConfig::default();
        config.sweep_interval_ms = 4_500;
        shared.set_config_update(config);

        let taken = shared.take_config_update().unwrap();
        assert_eq!(taken.sweep_interval_ms, 4_500);
        assert!(shared.take_config_update().is_none());
        // The active view is untouched until the next boot loads the blob.
        assert_eq!(shared.active_config().sweep_interval_ms,
                   SystemConfig::default().sweep_interval_ms);
    }

    #[test]
    fn mailbox_bounds_inbound_commands() {
        let mut shared = ChannelShared::new();
        for _ in 0..8 {
            assert!(shared.push_command(PendingCommand::noop(), CommandSource::Request));
        }
        assert!(!shared.push_command(PendingCommand::noop(), CommandSource::Bus));

        let mut n = 0;
        while shared.pop_command().is_some() {
            n += 1;
        }
        assert_eq!(n, 8);
    }
}
