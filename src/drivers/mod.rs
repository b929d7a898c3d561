//! Peripheral drivers and one-shot hardware initialization.

pub mod button;
pub mod hw_init;
pub mod servo;
pub mod status_led;
