//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the bridge.  The whole [`BridgeConfig`] is
//! stored as one `postcard` blob under namespace `tbao`, key `bridgecfg`.
//!
//! - Validation: every field is range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - A missing blob is not an error; the build-time defaults apply.

use crate::adapters::utils::is_url_safe;
use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::BridgeConfig;
use log::info;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"tbao\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"bridgecfg\0";

const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    blob: std::cell::RefCell<Option<Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: std::cell::RefCell::new(None),
        })
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(write: bool, f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>) -> Result<T, esp_err_t> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob() -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr().cast(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            // A fresh partition has no namespace yet either.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => Ok(None),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH as esp_err_t => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.blob.borrow().clone())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(bytes: &[u8]) -> Result<(), ConfigError> {
        Self::with_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, CONFIG_KEY.as_ptr().cast(), bytes.as_ptr().cast(), bytes.len())
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        *self.blob.borrow_mut() = Some(bytes.to_vec());
        Ok(())
    }

    /// Simulation: overwrite the stored blob with arbitrary bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_store_raw(&self, bytes: &[u8]) {
        *self.blob.borrow_mut() = Some(bytes.to_vec());
    }
}

fn validate_config(cfg: &BridgeConfig) -> Result<(), ConfigError> {
    if cfg.device_id.len() > 32 || !is_url_safe(&cfg.device_id) {
        return Err(ConfigError::ValidationFailed(
            "device_id must be at most 32 URL-safe bytes",
        ));
    }
    if cfg.backend_host.is_empty() || cfg.backend_host.len() > 64 {
        return Err(ConfigError::ValidationFailed("backend_host must be 1–64 bytes"));
    }
    if cfg.backend_port == 0 {
        return Err(ConfigError::ValidationFailed("backend_port must be non-zero"));
    }
    if cfg.wifi_ssid.len() > 32 || cfg.wifi_pass.len() > 64 {
        return Err(ConfigError::ValidationFailed(
            "wifi_ssid must be ≤32 bytes and wifi_pass ≤64 bytes",
        ));
    }
    if cfg.greeting.len() > 128 {
        return Err(ConfigError::ValidationFailed("greeting must be ≤128 bytes"));
    }
    if !(9_600..=921_600).contains(&cfg.serial_baud) {
        return Err(ConfigError::ValidationFailed("serial_baud must be 9600–921600"));
    }
    if !(1_000..=120_000).contains(&cfg.health_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "health_timeout_ms must be 1000–120000",
        ));
    }
    if !(1_000..=3_600_000).contains(&cfg.status_poll_interval_ms)
        || !(1_000..=3_600_000).contains(&cfg.heartbeat_interval_ms)
    {
        return Err(ConfigError::ValidationFailed(
            "status poll and heartbeat intervals must be 1000–3600000",
        ));
    }
    if !(500..=60_000).contains(&cfg.control_reconnect_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_reconnect_ms must be 500–60000",
        ));
    }
    if !(1_000..=60_000).contains(&cfg.control_connect_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_connect_timeout_ms must be 1000–60000",
        ));
    }
    if !(5_000..=60_000).contains(&cfg.watchdog_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "watchdog_timeout_ms must be 5000–60000",
        ));
    }
    // The watchdog is fed before each request, so a window holds at most
    // one request plus one control connect.
    if cfg.http_timeout_ms < 500
        || cfg.http_timeout_ms.saturating_mul(2) > u64::from(cfg.watchdog_timeout_ms)
    {
        return Err(ConfigError::ValidationFailed(
            "http_timeout_ms must be ≥500 and at most half the watchdog timeout",
        ));
    }
    if !(1..=100).contains(&cfg.loop_yield_ms) {
        return Err(ConfigError::ValidationFailed("loop_yield_ms must be 1–100"));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<BridgeConfig, ConfigError> {
        #[cfg(target_os = "espidf")]
        let stored = Self::read_blob()?;
        #[cfg(not(target_os = "espidf"))]
        let stored = self.read_blob()?;

        match stored {
            Some(bytes) => {
                let cfg: BridgeConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                validate_config(&cfg)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(BridgeConfig::default())
            }
        }
    }

    fn save(&self, config: &BridgeConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::ValidationFailed("config blob too large"));
        }

        #[cfg(target_os = "espidf")]
        Self::write_blob(&bytes)?;
        #[cfg(not(target_os = "espidf"))]
        self.write_blob(&bytes)?;

        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
