//! ISR-debounced button driver with short-press and long-hold detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch on the BOOT strap pin, internal pull-up.
//! GPIO fires on the falling edge; the ISR records the raw timestamp into
//! an atomic, and the `tick()` method (called from the main loop at
//! control-tick rate) runs the debounce + gesture state machine.
//!
//! ## Gesture detection
//!
//! | Gesture    | Condition                     | Meaning            |
//! |------------|-------------------------------|--------------------|
//! | Short press| Release before the short max  | Reconnect network  |
//! | Long hold  | Held past the long minimum    | Factory reset      |
//!
//! A release that lands between the two thresholds is deliberately
//! swallowed: neither gesture was clearly intended.

use core::sync::atomic::{AtomicU32, Ordering};

const DEBOUNCE_MS: u32 = 50;

/// Raw ISR timestamp (milliseconds since boot, truncated to u32).
/// Written by the ISR, read by the main loop.
static BUTTON_ISR_TIMESTAMP: AtomicU32 = AtomicU32::new(0);

/// Button gestures emitted after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonGesture {
    ShortPress,
    LongHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    DebounceWait { since_ms: u32 },
    Pressed { since_ms: u32 },
    /// Long hold already reported; swallow everything until release.
    WaitRelease,
}

pub struct ButtonDriver {
    gpio: i32,
    state: GestureState,
    last_isr_ms: u32,
    short_press_max_ms: u32,
    long_hold_min_ms: u32,
}

impl ButtonDriver {
    pub fn new(gpio: i32, short_press_max_ms: u32, long_hold_min_ms: u32) -> Self {
        Self {
            gpio,
            state: GestureState::Idle,
            last_isr_ms: 0,
            short_press_max_ms,
            long_hold_min_ms,
        }
    }

    /// GPIO pin this button is attached to.
    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Call from the main loop at each control tick.
    /// `now_ms` is the current monotonic time in milliseconds.
    /// Returns a classified gesture, if any.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonGesture> {
        let isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);
        let new_press = isr_ms != self.last_isr_ms && isr_ms != 0;

        match self.state {
            GestureState::Idle => {
                if new_press {
                    self.last_isr_ms = isr_ms;
                    self.state = GestureState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            GestureState::DebounceWait { since_ms } => {
                if now_ms.wrapping_sub(since_ms) >= DEBOUNCE_MS {
                    if self.is_pressed_hw() {
                        self.state = GestureState::Pressed { since_ms };
                    } else {
                        // Glitch: edge fired but the level recovered.
                        self.state = GestureState::Idle;
                    }
                }
                None
            }

            GestureState::Pressed { since_ms } => {
                let held_ms = now_ms.wrapping_sub(since_ms);

                if held_ms >= self.long_hold_min_ms {
                    self.state = GestureState::WaitRelease;
                    return Some(ButtonGesture::LongHold);
                }

                if !self.is_pressed_hw() {
                    self.state = GestureState::Idle;
                    if held_ms < self.short_press_max_ms {
                        return Some(ButtonGesture::ShortPress);
                    }
                    // Between short max and long min: ambiguous, drop it.
                }

                None
            }

            GestureState::WaitRelease => {
                if !self.is_pressed_hw() {
                    self.state = GestureState::Idle;
                }
                None
            }
        }
    }

    fn is_pressed_hw(&self) -> bool {
        // Active-low: pressed pulls the line to ground.
        !crate::drivers::hw_init::gpio_read(self.gpio)
    }
}

/// ISR handler — register this on the button GPIO falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
#[allow(unused)]
pub fn button_isr_handler(now_ms: u32) {
    BUTTON_ISR_TIMESTAMP.store(now_ms, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::hw_init::sim_set_gpio_level;
    use std::sync::{Mutex, MutexGuard};

    // The ISR timestamp and the simulated GPIO level are process-wide;
    // serialize the tests that touch them.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn setup() -> MutexGuard<'static, ()> {
        let guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        BUTTON_ISR_TIMESTAMP.store(0, Ordering::SeqCst);
        sim_set_gpio_level(true);
        guard
    }

    fn driver() -> ButtonDriver {
        ButtonDriver::new(0, 1_000, 3_000)
    }

    #[test]
    fn no_gesture_without_press() {
        let _g = setup();
        let mut btn = driver();
        assert_eq!(btn.tick(100), None);
        assert_eq!(btn.tick(200), None);
    }

    #[test]
    fn glitch_shorter_than_debounce_is_dropped() {
        let _g = setup();
        let mut btn = driver();
        button_isr_handler(100);
        assert_eq!(btn.tick(100), None); // debounce wait
        // Level back high by the time debounce expires: no press.
        assert_eq!(btn.tick(160), None);
        assert_eq!(btn.tick(1_000), None);
    }

    #[test]
    fn short_press_on_quick_release() {
        let _g = setup();
        let mut btn = driver();
        button_isr_handler(100);
        sim_set_gpio_level(false);
        assert_eq!(btn.tick(100), None); // edge latched
        assert_eq!(btn.tick(160), None); // debounce confirms press
        sim_set_gpio_level(true);
        assert_eq!(btn.tick(400), Some(ButtonGesture::ShortPress));
    }

    #[test]
    fn long_hold_fires_while_still_pressed() {
        let _g = setup();
        let mut btn = driver();
        button_isr_handler(1_000);
        sim_set_gpio_level(false);
        btn.tick(1_000);
        btn.tick(1_060);
        assert_eq!(btn.tick(2_000), None);
        assert_eq!(btn.tick(4_100), Some(ButtonGesture::LongHold));
        // Still held: no repeat.
        assert_eq!(btn.tick(8_000), None);
        sim_set_gpio_level(true);
        assert_eq!(btn.tick(8_100), None);
    }

    #[test]
    fn ambiguous_release_is_swallowed() {
        let _g = setup();
        let mut btn = driver();
        button_isr_handler(100);
        sim_set_gpio_level(false);
        btn.tick(100);
        btn.tick(160);
        // Released after 2s: past short max, before long min.
        sim_set_gpio_level(true);
        assert_eq!(btn.tick(2_160), None);
        assert_eq!(btn.tick(3_000), None);
    }

    #[test]
    fn second_press_after_short_press_is_detected() {
        let _g = setup();
        let mut btn = driver();
        button_isr_handler(100);
        sim_set_gpio_level(false);
        btn.tick(100);
        btn.tick(160);
        sim_set_gpio_level(true);
        assert_eq!(btn.tick(300), Some(ButtonGesture::ShortPress));

        button_isr_handler(5_000);
        sim_set_gpio_level(false);
        btn.tick(5_000);
        btn.tick(5_060);
        sim_set_gpio_level(true);
        assert_eq!(btn.tick(5_300), Some(ButtonGesture::ShortPress));
    }
}
