//! MQTT publish/subscribe channel.
//!
//! One command topic inbound, one status topic outbound.  The bus has no
//! reply path: undecodable payloads and unauthorized commands are dropped
//! without any acknowledgement.  Status (`{"running": bool, "position": n}`)
//! goes out on an elapsed-time-gated timer while the broker link is up.
//!
//! Broker (re)connects are themselves elapsed-time gated and attempted only
//! while the station link is up — a down network must not turn the channel
//! pump into a busy retry loop.

use log::debug;
use serde::Serialize;

use crate::app::commands::PendingCommand;
use crate::app::events::StatusSnapshot;

use super::decode_command;

// ───────────────────────────────────────────────────────────────
// Wire codec (pure, host-tested)
// ───────────────────────────────────────────────────────────────

/// Decode a raw bus payload.  `None` means drop: not UTF-8 or not valid
/// JSON.  An envelope with an unknown action still decodes — the dispatcher
/// no-ops it.
pub fn decode_bus_command(payload: &[u8]) -> Option<PendingCommand> {
    let text = core::str::from_utf8(payload).ok()?;
    match decode_command(text) {
        Ok(cmd) => Some(cmd),
        Err(e) => {
            debug!("mqtt: dropping payload: {e}");
            None
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    running: bool,
    position: u8,
}

/// Encode the periodic status publish body.
pub fn status_payload(snapshot: &StatusSnapshot) -> String {
    serde_json::to_string(&StatusPayload {
        running: snapshot.servo_running,
        position: snapshot.servo_position,
    })
    .unwrap_or_else(|_| "{}".to_string())
}

// ───────────────────────────────────────────────────────────────
// Elapsed-time gate
// ───────────────────────────────────────────────────────────────

/// Rate limiter for retry-style work: `due()` answers true at most once per
/// interval, re-arming from the moment it fires.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedGate {
    interval_ms: u64,
    last_fire_ms: u64,
}

impl ElapsedGate {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_fire_ms: 0,
        }
    }

    pub fn due(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_fire_ms) >= self.interval_ms {
            self.last_fire_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Re-arm without firing (e.g. after a successful connect).
    pub fn reset(&mut self, now_ms: u64) {
        self.last_fire_ms = now_ms;
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client glue
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub mod client {
    //! EspMqttClient wiring.  The receive side runs on its own thread and
    //! feeds decoded commands into the shared mailbox; the main loop calls
    //! [`MqttChannel::publish_status`] on each publish tick.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use esp_idf_svc::mqtt::client::{
        EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
    };
    use log::{info, warn};

    use super::*;
    use crate::app::commands::CommandSource;
    use crate::channels::ChannelShared;
    use crate::config::SystemConfig;
    use crate::events::{self, Event};

    pub struct MqttChannel {
        client: EspMqttClient<'static>,
        status_topic: heapless::String<64>,
        connected: Arc<AtomicBool>,
    }

    impl MqttChannel {
        /// Connect to the broker and spawn the receive thread.  The client
        /// library handles transport-level reconnects; subscription renewal
        /// happens on every Connected event.
        pub fn start(
            config: &SystemConfig,
            shared: Arc<Mutex<ChannelShared>>,
        ) -> anyhow::Result<Self> {
            let url = format!("mqtt://{}:{}", config.mqtt_broker, config.mqtt_port);
            let conf = MqttClientConfiguration {
                client_id: Some("servolink"),
                ..Default::default()
            };

            let connected = Arc::new(AtomicBool::new(false));
            let command_topic: heapless::String<64> = config.mqtt_command_topic.clone();

            let (client, mut connection) = EspMqttClient::new(&url, &conf)?;

            let conn_flag = connected.clone();
            std::thread::Builder::new()
                .name("mqtt-rx".into())
                .stack_size(8 * 1024)
                .spawn(move || {
                    while let Ok(event) = connection.next() {
                        match event.payload() {
                            EventPayload::Connected(_) => {
                                conn_flag.store(true, Ordering::Relaxed);
                                info!("mqtt: connected");
                            }
                            EventPayload::Disconnected => {
                                conn_flag.store(false, Ordering::Relaxed);
                                warn!("mqtt: disconnected");
                            }
                            EventPayload::Received { data, .. } => {
                                if let Some(cmd) = decode_bus_command(data) {
                                    let queued = shared
                                        .lock()
                                        .map(|mut s| s.push_command(cmd, CommandSource::Bus))
                                        .unwrap_or(false);
                                    if queued {
                                        events::push_event(Event::CommandReceived);
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                })
                .map_err(|e| anyhow::anyhow!("mqtt rx thread spawn failed: {e}"))?;

            let mut channel = Self {
                client,
                status_topic: config.mqtt_status_topic.clone(),
                connected,
            };
            channel.subscribe(&command_topic);
            Ok(channel)
        }

        fn subscribe(&mut self, topic: &str) {
            if let Err(e) = self.client.subscribe(topic, QoS::AtMostOnce) {
                warn!("mqtt: subscribe to '{topic}' failed: {e}");
            }
        }

        pub fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }

        /// Publish the periodic status message.  Silently skipped while the
        /// broker link is down.
        pub fn publish_status(&mut self, snapshot: &StatusSnapshot) {
            if !self.is_connected() {
                return;
            }
            let payload = status_payload(snapshot);
            let topic: &str = &self.status_topic;
            if let Err(e) = self.client.enqueue(topic, QoS::AtMostOnce, false, payload.as_bytes())
            {
                warn!("mqtt: status publish failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::commands::CommandAction;

    #[test]
    fn bus_decode_good_payload() {
        let cmd = decode_bus_command(br#"{"command":"start","pwd":"tok"}"#).unwrap();
        assert_eq!(cmd.action, Some(CommandAction::Start));
        assert_eq!(cmd.supplied_secret.as_deref(), Some("tok"));
    }

    #[test]
    fn bus_decode_failure_is_a_silent_drop() {
        assert!(decode_bus_command(b"{garbage").is_none());
        assert!(decode_bus_command(&[0xff, 0xfe]).is_none());
    }

    #[test]
    fn status_payload_shape() {
        let mut snapshot = StatusSnapshot::default();
        snapshot.servo_running = true;
        snapshot.servo_position = 135;
        assert_eq!(status_payload(&snapshot), r#"{"running":true,"position":135}"#);
    }

    #[test]
    fn elapsed_gate_fires_once_per_interval() {
        let mut gate = ElapsedGate::new(5_000);
        assert!(gate.due(5_000));
        assert!(!gate.due(5_001));
        assert!(!gate.due(9_999));
        assert!(gate.due(10_000));
    }

    #[test]
    fn elapsed_gate_reset_rearms() {
        let mut gate = ElapsedGate::new(1_000);
        gate.reset(500);
        assert!(!gate.due(1_000));
        assert!(gate.due(1_500));
    }
}
