//! Hobby-servo PWM driver (LEDC channel 0).
//!
//! Converts a target angle into a 50 Hz pulse width and writes the duty
//! register. Moves are open-loop: the servo gives no feedback, so the
//! caller estimates travel time from the commanded delta.

use log::{debug, warn};

use crate::drivers::hw_init;
use crate::pins;
use crate::status::POSITION_MAX;

/// Duty register value for `angle` degrees at the configured timer
/// resolution and frame rate.
///
/// 0° maps to a 500 µs pulse, 180° to 2500 µs, linear in between.
pub fn angle_to_duty(angle: u8) -> u32 {
    let angle = angle.min(POSITION_MAX) as u32;
    let span_us = pins::SERVO_MAX_PULSE_US - pins::SERVO_MIN_PULSE_US;
    let pulse_us = pins::SERVO_MIN_PULSE_US + span_us * angle / POSITION_MAX as u32;
    let period_us = 1_000_000 / pins::SERVO_PWM_FREQ_HZ;
    let max_duty = 1u32 << pins::SERVO_PWM_RESOLUTION_BITS;
    pulse_us * max_duty / period_us
}

pub struct ServoDriver {
    attached: bool,
    position: u8,
}

impl ServoDriver {
    pub fn new() -> Self {
        Self {
            attached: false,
            position: 0,
        }
    }

    /// Bind the drive signal. The LEDC channel itself is configured during
    /// peripheral init; this records the binding and parks the servo at 0°.
    pub fn attach(&mut self, pin: i32) {
        if pin != pins::SERVO_PWM_GPIO {
            warn!(
                "servo: attach requested on GPIO{} but LEDC is wired to GPIO{}",
                pin,
                pins::SERVO_PWM_GPIO
            );
        }
        self.attached = true;
        self.move_to(0);
    }

    /// Command a move. Out-of-range angles are clamped to the mechanical
    /// limit before the duty write.
    pub fn move_to(&mut self, angle: u8) {
        let angle = angle.min(POSITION_MAX);
        if !self.attached {
            warn!("servo: move_to({}) before attach, ignoring", angle);
            return;
        }
        let duty = angle_to_duty(angle);
        hw_init::ledc_set_duty_raw(hw_init::LEDC_CH_SERVO, duty);
        debug!("servo: -> {}° (duty={})", angle, duty);
        self.position = angle;
    }

    /// Last commanded angle.
    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_endpoints_match_pulse_widths() {
        // 500 µs of a 20 ms frame at 14-bit resolution.
        assert_eq!(angle_to_duty(0), 409);
        // 2500 µs of a 20 ms frame.
        assert_eq!(angle_to_duty(180), 2048);
    }

    #[test]
    fn duty_midpoint_is_centred() {
        let mid = angle_to_duty(90);
        assert!((1225..=1232).contains(&mid), "90° duty {} out of range", mid);
    }

    #[test]
    fn duty_is_monotonic_in_angle() {
        let mut prev = angle_to_duty(0);
        for angle in 1..=180u8 {
            let duty = angle_to_duty(angle);
            assert!(duty >= prev, "duty not monotonic at {}°", angle);
            prev = duty;
        }
    }

    #[test]
    fn overrange_angle_clamps_to_limit() {
        assert_eq!(angle_to_duty(200), angle_to_duty(180));
    }

    #[test]
    fn move_before_attach_is_ignored() {
        let mut servo = ServoDriver::new();
        servo.move_to(90);
        assert_eq!(servo.position(), 0);
        assert!(!servo.is_attached());
    }

    #[test]
    fn attach_then_move_records_position() {
        let mut servo = ServoDriver::new();
        servo.attach(crate::pins::SERVO_PWM_GPIO);
        servo.move_to(135);
        assert_eq!(servo.position(), 135);
    }
}
