//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements       | Connects to                |
//! |------------|------------------|----------------------------|
//! | `hardware` | ActuatorPort     | LEDC servo PWM             |
//! |            | IndicatorPort    | RMT WS2812B status pixel   |
//! | `log_sink` | EventSink        | Serial log output          |
//! | `nvs`      | CredentialPort   | NVS / in-memory store      |
//! | `time`     | —                | ESP high-resolution timer  |
//! | `wifi`     | ConnectivityPort | ESP-IDF WiFi STA/AP        |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
