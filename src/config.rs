//! System configuration parameters
//!
//! All tunable parameters for the ServoLink device.
//! An override posted to `/config` is stored as a JSON blob in NVS and
//! replaces these defaults on the next boot.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Network acquisition ---
    /// Interval between automatic reconnect attempts (milliseconds)
    pub wifi_retry_interval_ms: u32,
    /// Consecutive failed attempts before falling back to AP mode
    pub max_connect_attempts: u8,
    /// SSID advertised in AP fallback mode
    pub ap_ssid: heapless::String<32>,
    /// Password for the AP fallback network (plaintext, low-entropy)
    pub ap_password: heapless::String<64>,

    // --- Servo ---
    /// Autonomous sweep interval while running (milliseconds)
    pub sweep_interval_ms: u32,
    /// Time for a full 0-180 degree travel (milliseconds)
    pub servo_full_travel_ms: u32,
    /// Settle margin added to every restore-move estimate (milliseconds)
    pub restore_settle_ms: u32,

    // --- MQTT ---
    /// Broker hostname
    pub mqtt_broker: heapless::String<64>,
    /// Broker port
    pub mqtt_port: u16,
    /// Topic subscribed for inbound commands
    pub mqtt_command_topic: heapless::String<64>,
    /// Topic for periodic status publishes
    pub mqtt_status_topic: heapless::String<64>,
    /// Status publish interval (milliseconds)
    pub publish_interval_ms: u32,

    // --- Button ---
    /// Presses shorter than this request a reconnect (milliseconds)
    pub short_press_max_ms: u32,
    /// Holds at least this long request a factory reset (milliseconds)
    pub long_hold_min_ms: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Network acquisition
            wifi_retry_interval_ms: 5_000,
            max_connect_attempts: 3,
            ap_ssid: heapless::String::try_from("ServoLink_AP").unwrap_or_default(),
            ap_password: heapless::String::try_from("12345678").unwrap_or_default(),

            // Servo: full travel ~300ms at 60deg/100ms, plus settle margin
            sweep_interval_ms: 2_000,
            servo_full_travel_ms: 300,
            restore_settle_ms: 500,

            // MQTT
            mqtt_broker: heapless::String::try_from("broker.emqx.io").unwrap_or_default(),
            mqtt_port: 1883,
            mqtt_command_topic: heapless::String::try_from("servolink/command")
                .unwrap_or_default(),
            mqtt_status_topic: heapless::String::try_from("servolink/status").unwrap_or_default(),
            publish_interval_ms: 5_000,

            // Button
            short_press_max_ms: 1_000,
            long_hold_min_ms: 3_000,

            // Timing
            control_loop_interval_ms: 50, // 20 Hz
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.max_connect_attempts > 0);
        assert!(c.wifi_retry_interval_ms >= 1_000, "retry order of seconds");
        assert!(c.servo_full_travel_ms > 0);
        assert!(c.restore_settle_ms > 0);
        assert!(c.control_loop_interval_ms > 0);
        assert!(!c.ap_ssid.is_empty());
        assert!(!c.mqtt_command_topic.is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.max_connect_attempts, c2.max_connect_attempts);
        assert_eq!(c.wifi_retry_interval_ms, c2.wifi_retry_interval_ms);
        assert_eq!(c.mqtt_command_topic, c2.mqtt_command_topic);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = SystemConfig::default();
        assert!(
            c.control_loop_interval_ms < c.sweep_interval_ms,
            "control loop must out-pace the sweep interval"
        );
        assert!(
            c.control_loop_interval_ms < c.wifi_retry_interval_ms,
            "control loop must out-pace the retry interval"
        );
        assert!(
            c.short_press_max_ms < c.long_hold_min_ms,
            "short press window must end before the long-hold threshold"
        );
    }
}
