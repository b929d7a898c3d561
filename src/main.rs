//! ServoLink Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  HardwareAdapter    LogEventSink    NvsCredentialStore       │
//! │  (Actuator+Indicator) (EventSink)   (CredentialPort)         │
//! │  WifiAdapter        HTTP server     MQTT channel             │
//! │  (Connectivity)     (request ch.)   (bus ch.)                │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ────────────────        │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │        DeviceService + NetAcquisition (pure logic)   │    │
//! │  │  dispatcher · deferred restore · sweep · retry FSM   │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │                                                              │
//! │  Scheduler (delegate-driven) · VisualStatusEncoder           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod config;
mod error;
mod events;
mod indicator;
mod net;
mod pins;
mod scheduler;
mod status;

pub mod app;
mod adapters;
mod channels;
mod drivers;

// ── Imports ───────────────────────────────────────────────────
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use log::{info, warn};

use adapters::hardware::HardwareAdapter;
use adapters::log_sink::LogEventSink;
use adapters::nvs::{self, NvsCredentialStore};
use adapters::time::MonotonicClock;
use adapters::wifi::WifiAdapter;
use app::commands::{CommandSource, PendingCommand};
use app::events::AppEvent;
use app::ports::{ActuatorPort, CredentialPort, EventSink, IndicatorPort};
use app::service::DeviceService;
use channels::ChannelShared;
use config::SystemConfig;
use drivers::button::{ButtonDriver, ButtonGesture};
use events::{drain_events, push_event, Event};
use indicator::VisualStatusEncoder;
use net::NetAcquisition;
use scheduler::{Scheduler, SchedulerDelegate};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::rmt::config::TransmitConfig;
use esp_idf_svc::hal::rmt::TxRmtDriver;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

// ── Scheduler delegate ────────────────────────────────────────
//
// Bridges the scheduler (which knows nothing about the event system)
// to the ISR event queue: a due task becomes an `Event` pushed onto
// the lock-free queue, and the drain loop below does the actual work.

struct EventQueueDelegate;

impl SchedulerDelegate for EventQueueDelegate {
    fn on_task_due(&mut self, _label: &'static str, event: Event) {
        push_event(event);
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ServoLink v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Hardware peripherals ───────────────────────────────
    if let Err(e) = drivers::hw_init::init_peripherals() {
        // Peripheral init failure is critical — log and halt.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = drivers::hw_init::init_isr_service() {
        log::error!("ISR service init failed: {} — button disabled", e);
    }

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 3. Persistent storage ─────────────────────────────────
    if let Err(e) = nvs::init_nvs() {
        warn!("NVS init failed ({}), credentials will not persist", e);
    }
    let mut creds_store = NvsCredentialStore::new();
    let config = match creds_store.load_config() {
        Ok(c) => c,
        Err(app::ports::CredentialError::NotFound) => SystemConfig::default(),
        Err(e) => {
            warn!("config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 4. Construct adapters ─────────────────────────────────
    let mut hw = HardwareAdapter::new();
    let led_tx = TxRmtDriver::new(
        peripherals.rmt.channel0,
        peripherals.pins.gpio48,
        &TransmitConfig::new().clock_divider(1),
    )?;
    hw.attach_led(led_tx);
    hw.attach(pins::SERVO_PWM_GPIO);

    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, nvs_partition)?;
    let mut log_sink = LogEventSink;
    let clock = MonotonicClock::new();
    let mut button = ButtonDriver::new(
        pins::BUTTON_GPIO,
        config.short_press_max_ms,
        config.long_hold_min_ms,
    );
    let mut encoder = VisualStatusEncoder::new();

    // ── 5. Domain core ────────────────────────────────────────
    let mut service = DeviceService::new(config.clone());
    service.set_auth_token(creds_store.auth_token().as_str());
    log_sink.emit(&AppEvent::Started);

    let stored = match creds_store.load() {
        Ok(c) => Some(c),
        Err(app::ports::CredentialError::NotFound) => None,
        Err(e) => {
            warn!("credential load failed ({}), treating as unprovisioned", e);
            None
        }
    };
    let mut net = NetAcquisition::new(&config);
    net.start(stored, &mut wifi, service.status_mut(), &mut log_sink);

    // ── 6. Command channels ───────────────────────────────────
    let shared = Arc::new(Mutex::new(ChannelShared::new()));
    {
        let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
        guard.set_active_config(config.clone());
    }
    let _http = match channels::http::server::start(shared.clone()) {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("HTTP server start failed: {}", e);
            None
        }
    };
    // Broker connect waits for the station link; the control loop brings
    // the channel up through an elapsed-time gate.
    let mut mqtt: Option<channels::mqtt::client::MqttChannel> = None;
    let mut mqtt_gate = channels::mqtt::ElapsedGate::new(config.publish_interval_ms as u64);

    // ── 7. Scheduler ──────────────────────────────────────────
    let mut sched = Scheduler::new();
    let mut sched_delegate = EventQueueDelegate;
    let _ = sched.add("control", config.control_loop_interval_ms as u64, Event::ControlTick);
    let publish_slot = sched.add("publish", config.publish_interval_ms as u64, Event::PublishTick);

    info!("System ready. Entering control loop.");

    // ── 8. Control loop ───────────────────────────────────────
    loop {
        FreeRtos::delay_ms(10);
        let now = clock.now_ms();

        sched.tick(now, &mut sched_delegate);

        if let Some(gesture) = button.tick(now as u32) {
            match gesture {
                ButtonGesture::ShortPress => {
                    push_event(Event::ButtonShortPress);
                }
                ButtonGesture::LongHold => {
                    push_event(Event::ButtonLongPress);
                }
            }
        }

        drain_events(|event| match event {
            Event::ControlTick => {
                net.evaluate(now, &mut wifi, service.status_mut(), &mut log_sink);
                service.tick(now, &mut hw, &mut log_sink);

                let colour = encoder.encode(
                    service.status().connectivity(),
                    service.status().servo_running(),
                    now,
                );
                hw.set_colour(colour);
                hw.show();

                {
                    let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.update_snapshot(service.snapshot());
                }

                // Publishing is pointless without a station link.
                if let Some(slot) = publish_slot {
                    sched.set_task_enabled(slot, net.is_connected());
                }

                if mqtt.is_none() && net.is_connected() && mqtt_gate.due(now) {
                    match channels::mqtt::client::MqttChannel::start(&config, shared.clone()) {
                        Ok(ch) => mqtt = Some(ch),
                        Err(e) => warn!("MQTT channel start failed: {}", e),
                    }
                }
            }

            Event::PublishTick => {
                let snapshot = service.publish(&mut log_sink);
                if let Some(mqtt) = mqtt.as_mut() {
                    mqtt.publish_status(&snapshot);
                }
            }

            Event::CommandReceived => {
                let mut pending: heapless::Vec<(PendingCommand, CommandSource), 8> =
                    heapless::Vec::new();
                {
                    let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    while let Some(entry) = guard.pop_command() {
                        if pending.push(entry).is_err() {
                            break;
                        }
                    }
                }
                for (cmd, source) in &pending {
                    service.handle_command(cmd, *source, now, &mut hw, &mut log_sink);
                }
            }

            Event::CredentialsUpdated => {
                let update = {
                    let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.take_credential_update()
                };
                if let Some(new_creds) = update {
                    if let Err(e) = creds_store.save(&new_creds) {
                        warn!("credential save failed: {}", e);
                    }
                    net.reset(Some(new_creds), &mut wifi, service.status_mut(), &mut log_sink);
                }
            }

            Event::ConfigUpdated => {
                let update = {
                    let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.take_config_update()
                };
                if let Some(new_config) = update {
                    match creds_store.save_config(&new_config) {
                        Ok(()) => info!("config saved, takes effect after restart"),
                        Err(e) => warn!("config save failed: {}", e),
                    }
                }
            }

            Event::CredentialsCleared => {
                let requested = {
                    let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.take_credential_clear()
                };
                if requested {
                    factory_reset(&mut creds_store);
                }
            }

            Event::ButtonShortPress => {
                info!("Button: short press → reconnect");
                net.reset(creds_store.load().ok(), &mut wifi, service.status_mut(), &mut log_sink);
            }

            Event::ButtonLongPress => {
                info!("Button: long hold → factory reset");
                factory_reset(&mut creds_store);
            }
        });
    }
}

/// Wipe stored credentials and reboot into provisioning mode.
fn factory_reset(creds_store: &mut NvsCredentialStore) {
    if let Err(e) = creds_store.clear() {
        warn!("credential wipe failed: {}", e);
    }
    info!("factory reset: restarting");
    // SAFETY: esp_restart never returns; all peripherals are reinitialized
    // on the way back up.
    unsafe { esp_idf_svc::sys::esp_restart() };
}
