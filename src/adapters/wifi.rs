//! ConnectivityPort adapter over the ESP-IDF WiFi driver.
//!
//! Station joins are asynchronous: `begin_join` kicks off the connect and
//! the acquisition machine watches `is_connected` on subsequent passes.
//! The same adapter also hosts the fallback access point.
//!
//! Off-target the radio is simulated: a join completes after a couple of
//! polls unless a test scripts it to fail.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConnectivityError, ConnectivityPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimRadioState,
    current_ssid: Option<heapless::String<32>>,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimRadioState {
    join_pending: bool,
    polls_remaining: u8,
    link_up: bool,
    ap_active: bool,
    fail_next_join: bool,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let wifi = EspWifi::new(modem, sysloop, Some(nvs))?;
        Ok(Self {
            wifi,
            current_ssid: None,
        })
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            sim: SimRadioState::default(),
            current_ssid: None,
        }
    }

    /// Test hook: make the next `begin_join` fail outright.
    pub fn sim_fail_next_join(&mut self) {
        self.sim.fail_next_join = true;
    }

    /// Test hook: drop an established link.
    pub fn sim_drop_link(&mut self) {
        self.sim.link_up = false;
    }
}

// ── Platform backend (target) ─────────────────────────────────

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    fn platform_begin_join(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let conf = Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| ConnectivityError::ConnectionFailed)?,
            password: password
                .try_into()
                .map_err(|_| ConnectivityError::ConnectionFailed)?,
            auth_method,
            ..Default::default()
        });
        self.wifi
            .set_configuration(&conf)
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        self.wifi
            .start()
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        self.wifi
            .connect()
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        info!("wifi: station join started (ssid={})", ssid);
        Ok(())
    }

    fn platform_poll(&mut self) {
        // Link and DHCP progress arrive via the system event loop.
    }

    fn platform_is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("wifi: disconnect failed: {}", e);
        }
    }

    fn platform_start_ap(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let conf = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| ConnectivityError::ApStartFailed)?,
            password: password
                .try_into()
                .map_err(|_| ConnectivityError::ApStartFailed)?,
            auth_method,
            channel: 1,
            ..Default::default()
        });
        self.wifi
            .set_configuration(&conf)
            .map_err(|_| ConnectivityError::ApStartFailed)?;
        self.wifi
            .start()
            .map_err(|_| ConnectivityError::ApStartFailed)?;
        info!("wifi: fallback access point up (ssid={})", ssid);
        Ok(())
    }

    fn platform_stop_ap(&mut self) {
        if let Err(e) = self.wifi.stop() {
            warn!("wifi: stop failed: {}", e);
        }
    }

    fn platform_ip_address(&self) -> Option<heapless::String<16>> {
        use core::fmt::Write;
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        let mut out = heapless::String::new();
        write!(out, "{}", info.ip).ok()?;
        Some(out)
    }
}

// ── Platform backend (simulation) ─────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    const SIM_JOIN_POLLS: u8 = 2;

    fn platform_begin_join(&mut self, ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        if self.sim.fail_next_join {
            self.sim.fail_next_join = false;
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.sim.join_pending = true;
        self.sim.polls_remaining = Self::SIM_JOIN_POLLS;
        info!("wifi(sim): station join started (ssid={})", ssid);
        Ok(())
    }

    fn platform_poll(&mut self) {
        if self.sim.join_pending {
            self.sim.polls_remaining = self.sim.polls_remaining.saturating_sub(1);
            if self.sim.polls_remaining == 0 {
                self.sim.join_pending = false;
                self.sim.link_up = true;
            }
        }
    }

    fn platform_is_connected(&self) -> bool {
        self.sim.link_up
    }

    fn platform_disconnect(&mut self) {
        self.sim.link_up = false;
        self.sim.join_pending = false;
    }

    fn platform_start_ap(&mut self, ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        self.sim.ap_active = true;
        info!("wifi(sim): fallback access point up (ssid={})", ssid);
        Ok(())
    }

    fn platform_stop_ap(&mut self) {
        self.sim.ap_active = false;
    }

    fn platform_ip_address(&self) -> Option<heapless::String<16>> {
        if self.sim.link_up {
            heapless::String::try_from("192.168.1.50").ok()
        } else {
            None
        }
    }
}

// ── ConnectivityPort implementation ───────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn begin_join(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        self.current_ssid = heapless::String::try_from(ssid).ok();
        self.platform_begin_join(ssid, password)
    }

    fn poll(&mut self) {
        self.platform_poll();
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        self.platform_start_ap(ssid, password)
    }

    fn stop_access_point(&mut self) {
        self.platform_stop_ap();
    }

    fn ssid(&self) -> Option<&str> {
        if self.is_connected() {
            self.current_ssid.as_deref()
        } else {
            None
        }
    }

    fn ip_address(&self) -> Option<heapless::String<16>> {
        self.platform_ip_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_completes_after_polling() {
        let mut radio = WifiAdapter::new();
        radio.begin_join("HomeNet", "pw").unwrap();
        assert!(!radio.is_connected());
        radio.poll();
        radio.poll();
        assert!(radio.is_connected());
        assert_eq!(radio.ssid(), Some("HomeNet"));
        assert_eq!(radio.ip_address().unwrap().as_str(), "192.168.1.50");
    }

    #[test]
    fn scripted_failure_rejects_join() {
        let mut radio = WifiAdapter::new();
        radio.sim_fail_next_join();
        assert_eq!(
            radio.begin_join("HomeNet", "pw"),
            Err(ConnectivityError::ConnectionFailed)
        );
        // Next attempt succeeds again.
        radio.begin_join("HomeNet", "pw").unwrap();
    }

    #[test]
    fn ssid_is_hidden_while_disconnected() {
        let mut radio = WifiAdapter::new();
        radio.begin_join("HomeNet", "pw").unwrap();
        radio.poll();
        radio.poll();
        radio.sim_drop_link();
        assert_eq!(radio.ssid(), None);
        assert_eq!(radio.ip_address(), None);
    }

    #[test]
    fn disconnect_cancels_pending_join() {
        let mut radio = WifiAdapter::new();
        radio.begin_join("HomeNet", "pw").unwrap();
        radio.disconnect();
        radio.poll();
        radio.poll();
        assert!(!radio.is_connected());
    }
}
