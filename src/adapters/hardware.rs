//! Combined hardware adapter — servo actuator plus status pixel.
//!
//! Owns the concrete drivers and exposes them through the port traits so
//! the domain core stays hardware-free.

use crate::app::ports::{ActuatorPort, IndicatorPort};
use crate::drivers::servo::ServoDriver;
use crate::drivers::status_led::StatusLed;
use crate::indicator::Rgb;

pub struct HardwareAdapter {
    servo: ServoDriver,
    led: StatusLed,
}

impl HardwareAdapter {
    pub fn new() -> Self {
        Self {
            servo: ServoDriver::new(),
            led: StatusLed::new(),
        }
    }

    /// Hand the RMT transmit driver for the pixel data line to the LED driver.
    #[cfg(target_os = "espidf")]
    pub fn attach_led(&mut self, tx: esp_idf_hal::rmt::TxRmtDriver<'static>) {
        self.led.attach(tx);
    }

    /// Last commanded servo angle.
    pub fn servo_position(&self) -> u8 {
        self.servo.position()
    }

    /// Last frame the pixel driver shipped in simulation.
    #[cfg(not(target_os = "espidf"))]
    pub fn last_led_frame(&self) -> Option<Rgb> {
        self.led.last_shown()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn attach(&mut self, pin: i32) {
        self.servo.attach(pin);
    }

    fn move_to(&mut self, angle: u8) {
        self.servo.move_to(angle);
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl IndicatorPort for HardwareAdapter {
    fn set_colour(&mut self, rgb: Rgb) {
        self.led.set_colour(rgb);
    }

    fn clear(&mut self) {
        self.led.clear();
    }

    fn show(&mut self) {
        self.led.show();
    }
}
