//! EventSink adapter that renders application events to the serial log.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => info!("event: firmware started"),
            AppEvent::Status(s) => info!(
                "status: {} ssid={} ip={} running={} position={}",
                s.connectivity.label(),
                if s.network_name.is_empty() { "-" } else { &s.network_name },
                if s.network_address.is_empty() { "-" } else { &s.network_address },
                s.servo_running,
                s.servo_position,
            ),
            AppEvent::ConnectivityChanged { from, to } => {
                info!("connectivity: {} -> {}", from.label(), to.label());
            }
            AppEvent::CommandApplied { running, position } => {
                info!("command applied: running={} position={}", running, position);
            }
            AppEvent::CommandDropped(reason) => warn!("command dropped: {}", reason),
            AppEvent::RestoreCompleted { position } => {
                info!("restore complete: back at {} deg", position);
            }
        }
    }
}
