//! Visual status encoder.
//!
//! Deterministic projection of (connectivity, servo running) plus elapsed
//! time onto the RGB indicator. Evaluated once per control pass; the only
//! mutable state is the blink bookkeeping {last toggle timestamp, phase}.
//!
//! ## Authoritative status table
//!
//! | condition                  | pattern                   |
//! |----------------------------|---------------------------|
//! | AP fallback                | blank blink (held dark)   |
//! | Disconnected               | fast blink, white         |
//! | Connecting                 | blink, yellow             |
//! | Connected, servo idle      | solid green               |
//! | Connected, servo running   | blink, blue               |
//! | Error                      | solid yellow              |
//!
//! Blink phase is not guaranteed to carry across a status change — the
//! toggle clock keeps running and the first frame after a change may land
//! on either half of the cycle.

use crate::status::Connectivity;

/// Colour as (R, G, B) tuple, each 0–255.
pub type Rgb = (u8, u8, u8);

/// Normal blink half-period (milliseconds).
pub const BLINK_PERIOD_MS: u64 = 500;
/// Fast blink half-period, used for the disconnected alert.
pub const FAST_BLINK_PERIOD_MS: u64 = 200;

// ── Well-known colour constants ───────────────────────────────

pub const COLOUR_OFF: Rgb = (0, 0, 0);
pub const COLOUR_ALERT: Rgb = (255, 255, 255); // White
pub const COLOUR_WARNING: Rgb = (255, 255, 0); // Yellow
pub const COLOUR_CONNECTED: Rgb = (0, 255, 0); // Green
pub const COLOUR_RUNNING: Rgb = (0, 0, 255); // Blue

/// One row of the status table: what to show and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Solid(Rgb),
    Blink { colour: Rgb, period_ms: u64 },
}

/// Encoder for the single status pixel.
pub struct VisualStatusEncoder {
    last_toggle_ms: u64,
    phase: bool,
}

impl VisualStatusEncoder {
    pub fn new() -> Self {
        Self {
            last_toggle_ms: 0,
            phase: false,
        }
    }

    /// Compute the indicator output for the current pass.
    pub fn encode(&mut self, connectivity: Connectivity, servo_running: bool, now_ms: u64) -> Rgb {
        match Self::pattern_for(connectivity, servo_running) {
            Pattern::Solid(colour) => colour,
            Pattern::Blink { colour, period_ms } => {
                if now_ms.wrapping_sub(self.last_toggle_ms) >= period_ms {
                    self.last_toggle_ms = now_ms;
                    self.phase = !self.phase;
                }
                if self.phase { colour } else { COLOUR_OFF }
            }
        }
    }

    fn pattern_for(connectivity: Connectivity, servo_running: bool) -> Pattern {
        match connectivity {
            // Blank blink: the toggle clock runs but both halves are dark,
            // matching the board's "provisioning" look.
            Connectivity::ApMode => Pattern::Blink {
                colour: COLOUR_OFF,
                period_ms: BLINK_PERIOD_MS,
            },
            Connectivity::Disconnected => Pattern::Blink {
                colour: COLOUR_ALERT,
                period_ms: FAST_BLINK_PERIOD_MS,
            },
            Connectivity::Connecting => Pattern::Blink {
                colour: COLOUR_WARNING,
                period_ms: BLINK_PERIOD_MS,
            },
            Connectivity::Connected => {
                if servo_running {
                    Pattern::Blink {
                        colour: COLOUR_RUNNING,
                        period_ms: BLINK_PERIOD_MS,
                    }
                } else {
                    Pattern::Solid(COLOUR_CONNECTED)
                }
            }
            Connectivity::Error => Pattern::Solid(COLOUR_WARNING),
        }
    }
}
