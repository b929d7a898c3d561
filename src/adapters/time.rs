//! Monotonic time source.
//!
//! On target this reads the ESP high-resolution timer (microseconds since
//! boot); on the host it measures from process start. Both are monotonic
//! and unaffected by wall-clock changes.

pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn now_ms(&self) -> u64 {
        // SAFETY: esp_timer_get_time is a lock-free counter read.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u64
    }

    /// Milliseconds since the clock was created.
    #[cfg(not(target_os = "espidf"))]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn uptime_secs(&self) -> u64 {
        self.now_ms() / 1_000
    }
}
