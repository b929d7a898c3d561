//! On-board WS2812B status pixel driver.
//!
//! The driver buffers the requested colour; nothing reaches the wire until
//! `show()`. On target the pixel is written via the RMT peripheral with the
//! WS2812B single-wire timing; on the host the last shown frame is recorded
//! for assertions.

#[cfg(target_os = "espidf")]
use log::warn;

use crate::indicator::{Rgb, COLOUR_OFF};

pub struct StatusLed {
    current: Rgb,
    #[cfg(target_os = "espidf")]
    tx: Option<esp_idf_hal::rmt::TxRmtDriver<'static>>,
    #[cfg(not(target_os = "espidf"))]
    last_shown: Option<Rgb>,
}

impl StatusLed {
    pub fn new() -> Self {
        Self {
            current: COLOUR_OFF,
            #[cfg(target_os = "espidf")]
            tx: None,
            #[cfg(not(target_os = "espidf"))]
            last_shown: None,
        }
    }

    /// Hand over the RMT transmit driver for the pixel data line.
    #[cfg(target_os = "espidf")]
    pub fn attach(&mut self, tx: esp_idf_hal::rmt::TxRmtDriver<'static>) {
        self.tx = Some(tx);
    }

    /// Buffer a colour for the next `show()`.
    pub fn set_colour(&mut self, rgb: Rgb) {
        self.current = rgb;
    }

    /// Buffer black for the next `show()`.
    pub fn clear(&mut self) {
        self.current = COLOUR_OFF;
    }

    /// Push the buffered colour to the pixel.
    pub fn show(&mut self) {
        #[cfg(target_os = "espidf")]
        if let Err(e) = self.transmit() {
            warn!("status_led: pixel write failed: {}", e);
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.last_shown = Some(self.current);
        }
    }

    /// Last frame that reached `show()` in simulation.
    #[cfg(not(target_os = "espidf"))]
    pub fn last_shown(&self) -> Option<Rgb> {
        self.last_shown
    }

    #[cfg(target_os = "espidf")]
    fn transmit(&mut self) -> Result<(), esp_idf_svc::sys::EspError> {
        use core::time::Duration;
        use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse};

        let Some(tx) = self.tx.as_mut() else {
            warn!("status_led: show() before attach");
            return Ok(());
        };

        let ticks_hz = tx.counter_clock()?;
        // WS2812B single-wire timing (datasheet ±150 ns tolerance).
        let t0h = Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(350))?;
        let t0l = Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(800))?;
        let t1h = Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(700))?;
        let t1l = Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(600))?;

        let (r, g, b) = self.current;
        // WS2812B shifts green first, MSB first.
        let grb: u32 = ((g as u32) << 16) | ((r as u32) << 8) | (b as u32);

        let mut signal = FixedLengthSignal::<24>::new();
        for i in 0..24 {
            let bit_set = grb & (1 << (23 - i)) != 0;
            let (high, low) = if bit_set { (t1h, t1l) } else { (t0h, t0l) };
            signal.set(i, &(high, low))?;
        }
        tx.start_blocking(&signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::COLOUR_CONNECTED;

    #[test]
    fn colour_is_buffered_until_show() {
        let mut led = StatusLed::new();
        led.set_colour(COLOUR_CONNECTED);
        assert_eq!(led.last_shown(), None);
        led.show();
        assert_eq!(led.last_shown(), Some(COLOUR_CONNECTED));
    }

    #[test]
    fn clear_buffers_black() {
        let mut led = StatusLed::new();
        led.set_colour(COLOUR_CONNECTED);
        led.show();
        led.clear();
        led.show();
        assert_eq!(led.last_shown(), Some(COLOUR_OFF));
    }
}
