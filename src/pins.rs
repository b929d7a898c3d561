//! GPIO / peripheral pin assignments for the ServoLink main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Servo (standard 50 Hz hobby servo, LEDC PWM)
// ---------------------------------------------------------------------------

/// LEDC PWM output driving the servo signal line.
pub const SERVO_PWM_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// Status indicator (single WS2812B pixel, on-board)
// ---------------------------------------------------------------------------

/// RMT data line for the on-board addressable RGB pixel.
pub const LED_DATA_GPIO: i32 = 48;

// ---------------------------------------------------------------------------
// User button (active-low, shares the BOOT strap pin)
// ---------------------------------------------------------------------------

/// Momentary push-button: short press = reconnect, long hold = factory reset.
pub const BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits). 14-bit gives fine pulse-width control at 50 Hz.
pub const SERVO_PWM_RESOLUTION_BITS: u32 = 14;
/// Standard hobby-servo frame rate.
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// Pulse width at 0 degrees (microseconds).
pub const SERVO_MIN_PULSE_US: u32 = 500;
/// Pulse width at 180 degrees (microseconds).
pub const SERVO_MAX_PULSE_US: u32 = 2500;
