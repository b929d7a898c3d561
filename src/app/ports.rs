//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ domain (net / service)
//! ```
//!
//! Driven adapters (WiFi, servo PWM, LED pixel, NVS) implement these traits.
//! The network acquisition machine and the command dispatcher consume them
//! via generics, so the domain core never touches hardware directly.
//!
//! ## Security notes
//!
//! - Credentials and the authorization token are plaintext by design (see
//!   the device threat model); `CredentialPort` implementations still keep
//!   them in their own NVS namespace.
//! - The authorization token is a **separate field** from the network
//!   password — the two concerns are never conflated.

use core::fmt;

use crate::indicator::Rgb;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → servo hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the servo. Moves are fire-and-forget: the hardware
/// gives no completion signal, so callers estimate travel time themselves.
pub trait ActuatorPort {
    /// Bind the drive signal to a pin. Called once at boot.
    fn attach(&mut self, pin: i32);

    /// Command a move to `angle` (degrees, caller guarantees 0..=180).
    fn move_to(&mut self, angle: u8);
}

// ───────────────────────────────────────────────────────────────
// Indicator port (driven adapter: domain → status pixel)
// ───────────────────────────────────────────────────────────────

/// The core computes colour and timing; the driver performs the write.
pub trait IndicatorPort {
    fn set_colour(&mut self, rgb: Rgb);
    fn clear(&mut self);
    fn show(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Credential store port (driven adapter: domain ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Stored network-join credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Credentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Option<Self> {
        Some(Self {
            ssid: heapless::String::try_from(ssid).ok()?,
            password: heapless::String::try_from(password).ok()?,
        })
    }
}

/// Errors from [`CredentialPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// Nothing stored (first boot or after a factory reset).
    NotFound,
    /// Stored blob failed deserialization.
    Corrupted,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "credentials not found"),
            Self::Corrupted => write!(f, "credentials corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

/// Persistent credential + token storage.
///
/// Writes MUST be atomic — no partial credentials on power loss. The
/// ESP-IDF NVS API guarantees this natively; the in-memory simulation
/// achieves it trivially.
pub trait CredentialPort {
    /// Load stored credentials. `Err(NotFound)` on first boot.
    fn load(&self) -> Result<Credentials, CredentialError>;

    /// Persist credentials atomically.
    fn save(&mut self, credentials: &Credentials) -> Result<(), CredentialError>;

    /// Erase stored credentials. `Ok` even if none were stored.
    fn clear(&mut self) -> Result<(), CredentialError>;

    /// The message-bus authorization token (empty if never provisioned).
    fn auth_token(&self) -> heapless::String<64>;

    /// Persist a new authorization token.
    fn save_auth_token(&mut self, token: &str) -> Result<(), CredentialError>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: domain ↔ WiFi STA/AP)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    ConnectionFailed,
    ApStartFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::ApStartFailed => write!(f, "access point start failed"),
        }
    }
}

/// Radio-facing port consumed by the network acquisition machine.
///
/// `begin_join` starts an asynchronous station join; the machine then calls
/// `poll` each pass and observes progress through `is_connected`.
pub trait ConnectivityPort {
    /// Kick off a station-mode join. Non-blocking.
    fn begin_join(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;

    /// Advance the platform driver (DHCP, link events). Called every pass.
    fn poll(&mut self);

    /// Whether the station currently holds a link + address.
    fn is_connected(&self) -> bool;

    /// Tear down the station link.
    fn disconnect(&mut self);

    /// Start the local fallback access point.
    fn start_access_point(&mut self, ssid: &str, password: &str)
    -> Result<(), ConnectivityError>;

    /// Stop the fallback access point.
    fn stop_access_point(&mut self);

    /// SSID of the joined network, when connected.
    fn ssid(&self) -> Option<&str>;

    /// Assigned IP address, when connected.
    fn ip_address(&self) -> Option<heapless::String<16>>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT
/// status topic, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
