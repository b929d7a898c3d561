//! CredentialPort adapter over ESP-IDF NVS.
//!
//! Credentials are stored as a single JSON blob so the write is atomic —
//! NVS commits a blob in one transaction, so power loss never leaves a
//! half-written SSID/password pair. The authorization token lives under
//! its own key in the same namespace.
//!
//! On the host the store is an in-memory map with identical semantics.

use log::{info, warn};

use crate::app::ports::{CredentialError, CredentialPort, Credentials};
use crate::config::SystemConfig;

const CRED_NAMESPACE: &str = "servolink";
const KEY_CREDENTIALS: &str = "wifi_creds";
const KEY_AUTH_TOKEN: &str = "auth_token";
const KEY_CONFIG: &str = "sys_config";

/// Initialize the NVS flash partition. Call once from `main()` before any
/// store is opened.
#[cfg(target_os = "espidf")]
pub fn init_nvs() -> Result<(), CredentialError> {
    use esp_idf_svc::sys::*;
    // SAFETY: Called once from main() before any other NVS access.
    unsafe {
        let mut ret = nvs_flash_init();
        if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
            warn!("nvs: partition needs erase (rc={}), reformatting", ret);
            if nvs_flash_erase() != ESP_OK as i32 {
                return Err(CredentialError::IoError);
            }
            ret = nvs_flash_init();
        }
        if ret != ESP_OK as i32 {
            return Err(CredentialError::IoError);
        }
    }
    info!("nvs: flash initialized");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_nvs() -> Result<(), CredentialError> {
    Ok(())
}

pub struct NvsCredentialStore {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<std::collections::HashMap<String, Vec<u8>>>,
}

impl NvsCredentialStore {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(std::collections::HashMap::new()),
        }
    }
}

// ── Platform backend (target) ─────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use super::*;
    use esp_idf_svc::sys::*;
    use std::ffi::CString;

    /// Open the namespace, run `f` on the handle, always close.
    fn with_nvs_handle<T>(
        f: impl FnOnce(nvs_handle_t) -> Result<T, CredentialError>,
    ) -> Result<T, CredentialError> {
        let ns = CString::new(CRED_NAMESPACE).map_err(|_| CredentialError::IoError)?;
        let mut handle: nvs_handle_t = 0;
        // SAFETY: ns outlives the call; handle is closed before return.
        let ret = unsafe { nvs_open(ns.as_ptr(), nvs_open_mode_t_NVS_READWRITE, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(CredentialError::IoError);
        }
        let out = f(handle);
        unsafe { nvs_close(handle) };
        out
    }

    pub fn read_blob(key: &str) -> Result<Option<Vec<u8>>, CredentialError> {
        let key_c = CString::new(key).map_err(|_| CredentialError::IoError)?;
        with_nvs_handle(|handle| {
            let mut len: usize = 0;
            // SAFETY: two-call pattern; first call sizes, second fills.
            let ret =
                unsafe { nvs_get_blob(handle, key_c.as_ptr(), core::ptr::null_mut(), &mut len) };
            if ret == ESP_ERR_NVS_NOT_FOUND as i32 {
                return Ok(None);
            }
            if ret != ESP_OK as i32 {
                return Err(CredentialError::IoError);
            }
            let mut buf = vec![0u8; len];
            let ret = unsafe {
                nvs_get_blob(handle, key_c.as_ptr(), buf.as_mut_ptr().cast(), &mut len)
            };
            if ret != ESP_OK as i32 {
                return Err(CredentialError::IoError);
            }
            buf.truncate(len);
            Ok(Some(buf))
        })
    }

    pub fn write_blob(key: &str, value: &[u8]) -> Result<(), CredentialError> {
        let key_c = CString::new(key).map_err(|_| CredentialError::IoError)?;
        with_nvs_handle(|handle| {
            // SAFETY: value slice outlives the call; commit flushes to flash.
            let ret = unsafe {
                nvs_set_blob(handle, key_c.as_ptr(), value.as_ptr().cast(), value.len())
            };
            if ret != ESP_OK as i32 {
                return Err(CredentialError::IoError);
            }
            if unsafe { nvs_commit(handle) } != ESP_OK as i32 {
                return Err(CredentialError::IoError);
            }
            Ok(())
        })
    }

    pub fn erase_key(key: &str) -> Result<(), CredentialError> {
        let key_c = CString::new(key).map_err(|_| CredentialError::IoError)?;
        with_nvs_handle(|handle| {
            // SAFETY: erasing an absent key is a no-op, reported as NOT_FOUND.
            let ret = unsafe { nvs_erase_key(handle, key_c.as_ptr()) };
            if ret != ESP_OK as i32 && ret != ESP_ERR_NVS_NOT_FOUND as i32 {
                return Err(CredentialError::IoError);
            }
            if unsafe { nvs_commit(handle) } != ESP_OK as i32 {
                return Err(CredentialError::IoError);
            }
            Ok(())
        })
    }
}

// ── Backend dispatch ──────────────────────────────────────────

impl NvsCredentialStore {
    #[cfg(target_os = "espidf")]
    fn backend_read(&self, key: &str) -> Result<Option<Vec<u8>>, CredentialError> {
        platform::read_blob(key)
    }

    #[cfg(target_os = "espidf")]
    fn backend_write(&mut self, key: &str, value: &[u8]) -> Result<(), CredentialError> {
        platform::write_blob(key, value)
    }

    #[cfg(target_os = "espidf")]
    fn backend_erase(&mut self, key: &str) -> Result<(), CredentialError> {
        platform::erase_key(key)
    }

    #[cfg(not(target_os = "espidf"))]
    fn backend_read(&self, key: &str) -> Result<Option<Vec<u8>>, CredentialError> {
        Ok(self.store.borrow().get(key).cloned())
    }

    #[cfg(not(target_os = "espidf"))]
    fn backend_write(&mut self, key: &str, value: &[u8]) -> Result<(), CredentialError> {
        self.store.borrow_mut().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn backend_erase(&mut self, key: &str) -> Result<(), CredentialError> {
        self.store.borrow_mut().remove(key);
        Ok(())
    }
}

// ── Configuration blob ────────────────────────────────────────
//
// Stored alongside the credentials, same JSON-blob atomicity. Loaded once
// at boot; a save from the config endpoint takes effect on the next boot.

impl NvsCredentialStore {
    /// Load the persisted system configuration. `Err(NotFound)` when the
    /// device still runs on compile-time defaults.
    pub fn load_config(&self) -> Result<SystemConfig, CredentialError> {
        let blob = self
            .backend_read(KEY_CONFIG)?
            .ok_or(CredentialError::NotFound)?;
        serde_json::from_slice(&blob).map_err(|e| {
            warn!("nvs: stored config unreadable: {}", e);
            CredentialError::Corrupted
        })
    }

    /// Persist a configuration override atomically.
    pub fn save_config(&mut self, config: &SystemConfig) -> Result<(), CredentialError> {
        let blob = serde_json::to_vec(config).map_err(|_| CredentialError::IoError)?;
        self.backend_write(KEY_CONFIG, &blob)?;
        info!("nvs: configuration saved");
        Ok(())
    }
}

// ── CredentialPort implementation ─────────────────────────────

impl CredentialPort for NvsCredentialStore {
    fn load(&self) -> Result<Credentials, CredentialError> {
        let blob = self
            .backend_read(KEY_CREDENTIALS)?
            .ok_or(CredentialError::NotFound)?;
        serde_json::from_slice(&blob).map_err(|e| {
            warn!("nvs: stored credentials unreadable: {}", e);
            CredentialError::Corrupted
        })
    }

    fn save(&mut self, credentials: &Credentials) -> Result<(), CredentialError> {
        let blob = serde_json::to_vec(credentials).map_err(|_| CredentialError::IoError)?;
        self.backend_write(KEY_CREDENTIALS, &blob)?;
        info!("nvs: credentials saved (ssid={})", credentials.ssid);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CredentialError> {
        self.backend_erase(KEY_CREDENTIALS)?;
        info!("nvs: credentials cleared");
        Ok(())
    }

    fn auth_token(&self) -> heapless::String<64> {
        let Ok(Some(blob)) = self.backend_read(KEY_AUTH_TOKEN) else {
            return heapless::String::new();
        };
        core::str::from_utf8(&blob)
            .ok()
            .and_then(|s| heapless::String::try_from(s).ok())
            .unwrap_or_default()
    }

    fn save_auth_token(&mut self, token: &str) -> Result<(), CredentialError> {
        self.backend_write(KEY_AUTH_TOKEN, token.as_bytes())?;
        info!("nvs: authorization token updated");
        Ok(())
    }
}
