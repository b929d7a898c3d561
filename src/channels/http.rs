//! HTTP request/response channel.
//!
//! Routes (all bodies JSON unless noted):
//!
//! | route        | method | behavior                                   |
//! |--------------|--------|--------------------------------------------|
//! | `/`          | GET    | control page (HTML): status, servo, WiFi   |
//! | `/status`    | GET    | current device status                      |
//! | `/control`   | POST   | queue an actuator command                  |
//! | `/setwifi`   | POST   | store new credentials, restart acquisition |
//! | `/resetwifi` | POST   | wipe credentials                           |
//! | `/config`    | GET    | running configuration values               |
//! | `/config`    | POST   | persist a config override (next boot)      |
//!
//! Handlers answer immediately from decode + the mirrored snapshot; the
//! actual state change happens on the next main-loop pass.  Decode failures
//! get a structured 400 body — this channel never drops silently.
//!
//! The route table and reply builders below are pure and host-tested; the
//! ESP-IDF server glue at the bottom is `espidf`-only.

use serde::Serialize;

use crate::app::commands::PendingCommand;
use crate::app::events::StatusSnapshot;
use crate::app::ports::Credentials;
use crate::config::SystemConfig;
use crate::status::Connectivity;

use super::{ApiResponse, decode_command};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// A fully-built HTTP reply: status-code class plus JSON body.
#[derive(Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    fn ok(body: String) -> Self {
        Self { status: 200, body }
    }

    fn bad_request(message: &'static str) -> Self {
        Self {
            status: 400,
            body: ApiResponse::error(message).to_json(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// /status
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatusData<'a> {
    wifi_ssid: &'a str,
    wifi_ip: &'a str,
    is_running: bool,
    servo_position: u8,
}

/// Build the `/status` reply from a snapshot.
pub fn status_reply(snapshot: &StatusSnapshot) -> HttpReply {
    let connected = snapshot.connectivity == Connectivity::Connected;
    let data = StatusData {
        wifi_ssid: if connected && !snapshot.network_name.is_empty() {
            &snapshot.network_name
        } else {
            "-"
        },
        wifi_ip: if connected { &snapshot.network_address } else { "-" },
        is_running: snapshot.servo_running,
        servo_position: snapshot.servo_position,
    };
    HttpReply::ok(ApiResponse::ok_with(data, "").to_json())
}

// ───────────────────────────────────────────────────────────────
// /control
// ───────────────────────────────────────────────────────────────

/// Decode a `/control` body.  `Err` carries the ready-to-send 400 reply.
pub fn decode_control(body: &str) -> Result<PendingCommand, HttpReply> {
    decode_command(body).map_err(|_| HttpReply::bad_request("invalid command payload"))
}

/// Reply once a control command has been queued.
pub fn control_accepted_reply() -> HttpReply {
    HttpReply::ok(ApiResponse::ok("command accepted").to_json())
}

// ───────────────────────────────────────────────────────────────
// /setwifi and /resetwifi
// ───────────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct SetWifiBody {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

/// Decode a `/setwifi` body.  `Err` carries the ready-to-send 400 reply.
pub fn decode_set_wifi(body: &str) -> Result<Credentials, HttpReply> {
    let parsed: SetWifiBody = serde_json::from_str(body)
        .map_err(|_| HttpReply::bad_request("invalid credentials payload"))?;
    if parsed.ssid.is_empty() {
        return Err(HttpReply::bad_request("ssid must not be empty"));
    }
    Ok(Credentials {
        ssid: parsed.ssid,
        password: parsed.password,
    })
}

pub fn set_wifi_accepted_reply() -> HttpReply {
    HttpReply::ok(ApiResponse::ok("credentials saved, device will reconnect").to_json())
}

pub fn reset_wifi_reply() -> HttpReply {
    HttpReply::ok(ApiResponse::ok("credentials cleared").to_json())
}

pub fn not_found_reply() -> HttpReply {
    HttpReply {
        status: 404,
        body: ApiResponse::error("not found").to_json(),
    }
}

// ───────────────────────────────────────────────────────────────
// /config
// ───────────────────────────────────────────────────────────────

/// Build the `/config` GET reply from the running configuration.
pub fn config_reply(config: &SystemConfig) -> HttpReply {
    HttpReply::ok(ApiResponse::ok_with(config, "").to_json())
}

/// Decode a `/config` POST body. Expects a full config document (the GET
/// reply round-trips); `Err` carries the ready-to-send 400 reply.
pub fn decode_config(body: &str) -> Result<SystemConfig, HttpReply> {
    serde_json::from_str(body).map_err(|_| HttpReply::bad_request("invalid config payload"))
}

pub fn config_accepted_reply() -> HttpReply {
    HttpReply::ok(ApiResponse::ok("config saved, takes effect after restart").to_json())
}

// ───────────────────────────────────────────────────────────────
// / (index page)
// ───────────────────────────────────────────────────────────────

const PAGE_HEAD: &str = "<!doctype html><html><head><meta charset=\"utf-8\">\
    <title>ServoLink</title></head><body><h1>ServoLink</h1>";

// Controls post JSON to the routes above; status lines refresh by polling
// `/status`. Kept dependency-free so the page works from the fallback AP.
const PAGE_CONTROLS: &str = r#"
<h2>Servo</h2>
<p>
<button onclick="cmd({command:'start'})">Start</button>
<button onclick="cmd({command:'stop'})">Stop</button>
</p>
<p>
<input id="pos" type="range" min="0" max="180" value="90"
 oninput="document.getElementById('posv').textContent=this.value">
<span id="posv">90</span>&deg;
<label><input id="restore" type="checkbox"> restore</label>
<button onclick="moveServo()">Move</button>
</p>
<h2>WiFi</h2>
<form onsubmit="saveWifi(); return false">
<p>ssid <input id="ssid">
password <input id="pass" type="password">
<button>Save</button></p>
</form>
<script>
function cmd(c) {
  fetch('/control', {method: 'POST', body: JSON.stringify(c)});
}
function moveServo() {
  cmd({command: 'position',
       position: +document.getElementById('pos').value,
       restore: document.getElementById('restore').checked ? 1 : 0});
}
function saveWifi() {
  fetch('/setwifi', {method: 'POST', body: JSON.stringify({
    ssid: document.getElementById('ssid').value,
    password: document.getElementById('pass').value})});
}
function poll() {
  fetch('/status').then(r => r.json()).then(s => {
    document.getElementById('net').textContent =
      s.data.wifi_ssid + ' (' + s.data.wifi_ip + ')';
    document.getElementById('servo').textContent =
      (s.data.is_running ? 'running' : 'stopped') +
      ' at ' + s.data.servo_position + '°';
  });
}
setInterval(poll, 2000);
</script>
</body></html>"#;

/// Device control page: live status plus the servo controls and WiFi
/// provisioning form, all wired to the JSON routes above.
pub fn index_page(snapshot: &StatusSnapshot) -> String {
    format!(
        "{PAGE_HEAD}\
         <p>network: <span id=\"net\">{} ({})</span></p>\
         <p>servo: <span id=\"servo\">{} at {}&deg;</span></p>\
         {PAGE_CONTROLS}",
        snapshot.connectivity.label(),
        if snapshot.network_address.is_empty() {
            "-"
        } else {
            &snapshot.network_address
        },
        if snapshot.servo_running { "running" } else { "stopped" },
        snapshot.servo_position,
    )
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF server glue
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub mod server {
    //! EspHttpServer wiring.  Handlers run on the HTTP server task, so all
    //! shared state goes through the `ChannelShared` mutex; each handler
    //! holds the lock only to queue a request or copy the snapshot.

    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use esp_idf_svc::http::Method;
    use esp_idf_svc::http::server::{Configuration, EspHttpServer, Request};
    use esp_idf_svc::io::{Read, Write};
    use log::info;

    use super::*;
    use crate::app::commands::CommandSource;
    use crate::channels::ChannelShared;
    use crate::events::{self, Event};

    const MAX_BODY_BYTES: usize = 1024;

    /// Start the HTTP server and register all routes.
    /// The returned server must be kept alive for the program lifetime.
    pub fn start(shared: Arc<Mutex<ChannelShared>>) -> anyhow::Result<EspHttpServer<'static>> {
        let mut server = EspHttpServer::new(&Configuration::default())?;

        {
            let shared = shared.clone();
            server.fn_handler::<anyhow::Error, _>("/", Method::Get, move |req| {
                let page = {
                    let shared = lock(&shared)?;
                    index_page(shared.snapshot())
                };
                req.into_response(200, Some("OK"), &[("Content-Type", CONTENT_TYPE_HTML)])?
                    .write_all(page.as_bytes())?;
                Ok(())
            })?;
        }

        {
            let shared = shared.clone();
            server.fn_handler::<anyhow::Error, _>("/status", Method::Get, move |req| {
                let reply = {
                    let shared = lock(&shared)?;
                    status_reply(shared.snapshot())
                };
                write_reply(req, reply)
            })?;
        }

        {
            let shared = shared.clone();
            server.fn_handler::<anyhow::Error, _>("/control", Method::Post, move |mut req| {
                let body = read_body(&mut req)?;
                let reply = match decode_control(&body) {
                    Ok(cmd) => {
                        let queued = lock(&shared)?.push_command(cmd, CommandSource::Request);
                        if queued {
                            events::push_event(Event::CommandReceived);
                            control_accepted_reply()
                        } else {
                            HttpReply {
                                status: 503,
                                body: ApiResponse::error("command queue full").to_json(),
                            }
                        }
                    }
                    Err(reply) => reply,
                };
                write_reply(req, reply)
            })?;
        }

        {
            let shared = shared.clone();
            server.fn_handler::<anyhow::Error, _>("/setwifi", Method::Post, move |mut req| {
                let body = read_body(&mut req)?;
                let reply = match decode_set_wifi(&body) {
                    Ok(credentials) => {
                        info!("http: new credentials for '{}'", credentials.ssid);
                        lock(&shared)?.set_credential_update(credentials);
                        events::push_event(Event::CredentialsUpdated);
                        set_wifi_accepted_reply()
                    }
                    Err(reply) => reply,
                };
                write_reply(req, reply)
            })?;
        }

        {
            let shared = shared.clone();
            server.fn_handler::<anyhow::Error, _>("/resetwifi", Method::Post, move |req| {
                lock(&shared)?.request_credential_clear();
                events::push_event(Event::CredentialsCleared);
                write_reply(req, reset_wifi_reply())
            })?;
        }

        {
            let shared = shared.clone();
            server.fn_handler::<anyhow::Error, _>("/config", Method::Get, move |req| {
                let reply = {
                    let shared = lock(&shared)?;
                    config_reply(shared.active_config())
                };
                write_reply(req, reply)
            })?;
        }

        {
            let shared = shared.clone();
            server.fn_handler::<anyhow::Error, _>("/config", Method::Post, move |mut req| {
                let body = read_body(&mut req)?;
                let reply = match decode_config(&body) {
                    Ok(new_config) => {
                        lock(&shared)?.set_config_update(new_config);
                        events::push_event(Event::ConfigUpdated);
                        config_accepted_reply()
                    }
                    Err(reply) => reply,
                };
                write_reply(req, reply)
            })?;
        }

        info!("http: server up");
        Ok(server)
    }

    fn lock(
        shared: &Arc<Mutex<ChannelShared>>,
    ) -> anyhow::Result<std::sync::MutexGuard<'_, ChannelShared>> {
        shared.lock().map_err(|_| anyhow!("channel state poisoned"))
    }

    fn read_body(
        req: &mut Request<&mut esp_idf_svc::http::server::EspHttpConnection<'_>>,
    ) -> anyhow::Result<String> {
        let len = req.content_len().unwrap_or(0) as usize;
        if len > MAX_BODY_BYTES {
            return Err(anyhow!("request body too large"));
        }
        let mut buf = vec![0_u8; len];
        if len > 0 {
            req.read_exact(&mut buf)?;
        }
        Ok(String::from_utf8(buf)?)
    }

    fn write_reply(
        req: Request<&mut esp_idf_svc::http::server::EspHttpConnection<'_>>,
        reply: HttpReply,
    ) -> anyhow::Result<()> {
        req.into_response(reply.status, None, &[("Content-Type", CONTENT_TYPE_JSON)])?
            .write_all(reply.body.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::commands::CommandAction;

    fn connected_snapshot() -> StatusSnapshot {
        StatusSnapshot {
            connectivity: Connectivity::Connected,
            network_name: heapless::String::try_from("HomeNet").unwrap(),
            network_address: heapless::String::try_from("10.0.0.7").unwrap(),
            servo_running: true,
            servo_position: 42,
        }
    }

    #[test]
    fn status_reply_carries_identity_when_connected() {
        let reply = status_reply(&connected_snapshot());
        assert_eq!(reply.status, 200);
        assert!(reply.body.contains(r#""wifi_ssid":"HomeNet""#));
        assert!(reply.body.contains(r#""wifi_ip":"10.0.0.7""#));
        assert!(reply.body.contains(r#""is_running":true"#));
        assert!(reply.body.contains(r#""servo_position":42"#));
    }

    #[test]
    fn status_reply_masks_identity_when_not_connected() {
        let reply = status_reply(&StatusSnapshot::default());
        assert!(reply.body.contains(r#""wifi_ssid":"-""#));
        assert!(reply.body.contains(r#""wifi_ip":"-""#));
    }

    #[test]
    fn control_decode_failure_is_a_structured_400() {
        let reply = decode_control("{oops").unwrap_err();
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains(r#""success":false"#));
    }

    #[test]
    fn control_decode_success() {
        let cmd = decode_control(r#"{"command":"position","position":30}"#).unwrap();
        assert_eq!(cmd.action, Some(CommandAction::SetPosition));
        assert_eq!(cmd.target_position, Some(30));
    }

    #[test]
    fn set_wifi_requires_ssid() {
        assert!(decode_set_wifi(r#"{"ssid":"Net","password":"pw"}"#).is_ok());
        assert_eq!(
            decode_set_wifi(r#"{"ssid":"","password":"pw"}"#).unwrap_err().status,
            400
        );
        assert_eq!(decode_set_wifi(r#"{"password":"pw"}"#).unwrap_err().status, 400);
    }

    #[test]
    fn unknown_route_is_a_structured_404() {
        let reply = not_found_reply();
        assert_eq!(reply.status, 404);
        assert!(reply.body.contains(r#""success":false"#));
    }

    #[test]
    fn index_page_renders_current_state() {
        let page = index_page(&connected_snapshot());
        assert!(page.contains("connected"));
        assert!(page.contains("running"));
        assert!(page.contains("42"));
    }

    #[test]
    fn index_page_carries_the_device_controls() {
        let page = index_page(&StatusSnapshot::default());
        // Servo controls wired to /control.
        assert!(page.contains("'/control'"));
        assert!(page.contains("type=\"range\""));
        assert!(page.contains(">Start</button>"));
        assert!(page.contains(">Stop</button>"));
        assert!(page.contains("restore"));
        // Provisioning form wired to /setwifi.
        assert!(page.contains("'/setwifi'"));
        assert!(page.contains("id=\"ssid\""));
        assert!(page.contains("type=\"password\""));
        // Live status polling.
        assert!(page.contains("'/status'"));
    }

    #[test]
    fn config_get_reply_round_trips_through_post_decode() {
        let reply = config_reply(&SystemConfig::default());
        assert_eq!(reply.status, 200);

        // The GET body's data field is a valid POST body.
        let value: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        let decoded = decode_config(&value["data"].to_string()).unwrap();
        assert_eq!(decoded.max_connect_attempts,
                   SystemConfig::default().max_connect_attempts);
    }

    #[test]
    fn config_decode_failure_is_a_structured_400() {
        let reply = decode_config(r#"{"publish_interval_ms": "fast"}"#).unwrap_err();
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains(r#""success":false"#));
    }
}
