//! Bridge configuration parameters
//!
//! Network secrets, backend address and timing constants for the T-Bao
//! bridge.  Defaults are baked in at build time (`TBAO_*` environment
//! variables); a stored copy in NVS overrides them.

use serde::{Deserialize, Serialize};

/// Greeting carried by every heartbeat.
pub const DEFAULT_GREETING: &str = "Hello from T-Bao ESP32";

const DEFAULT_BACKEND_PORT: u16 = 3000;

/// Core bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    // --- Identity ---
    /// Id reported to the backend.  Empty means "derive from MAC".
    pub device_id: String,
    /// Greeting text of the heartbeat
    pub greeting: String,

    // --- Network ---
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub backend_host: String,
    pub backend_port: u16,

    // --- Serial link ---
    pub serial_baud: u32,

    // --- Timing (milliseconds) ---
    /// Peer silence before the link is considered lost
    pub health_timeout_ms: u64,
    /// `system_status` query interval
    pub status_poll_interval_ms: u64,
    /// Heartbeat post interval
    pub heartbeat_interval_ms: u64,
    /// Delay before reopening the control channel
    pub control_reconnect_ms: u64,
    /// Deadline for a control connection attempt
    pub control_connect_timeout_ms: u64,
    /// Per-request HTTP timeout
    pub http_timeout_ms: u64,
    /// Yield at the end of each relay iteration
    pub loop_yield_ms: u32,
    /// Task watchdog timeout
    pub watchdog_timeout_ms: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_id: option_env!("TBAO_DEVICE_ID").unwrap_or("dev-001").into(),
            greeting: DEFAULT_GREETING.into(),

            wifi_ssid: option_env!("TBAO_WIFI_SSID").unwrap_or("YOUR_WIFI_SSID").into(),
            wifi_pass: option_env!("TBAO_WIFI_PASS").unwrap_or("YOUR_WIFI_PASSWORD").into(),
            backend_host: option_env!("TBAO_BACKEND_HOST").unwrap_or("192.168.1.100").into(),
            backend_port: option_env!("TBAO_BACKEND_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_BACKEND_PORT),

            serial_baud: 115_200,

            health_timeout_ms: 10_000,
            status_poll_interval_ms: 30_000,
            heartbeat_interval_ms: 30_000,
            control_reconnect_ms: 3_000,
            control_connect_timeout_ms: 10_000,
            http_timeout_ms: 5_000,
            loop_yield_ms: 10,
            watchdog_timeout_ms: 10_000,
        }
    }
}

impl BridgeConfig {
    /// Path of the control channel, relative to the backend.
    pub fn control_path(&self) -> String {
        format!("/ws/subscribe?deviceId={}", self.device_id)
    }

    /// `ws://host:port` of the backend, without a path.
    pub fn control_origin(&self) -> String {
        format!("ws://{}:{}", self.backend_host, self.backend_port)
    }

    /// Full control-channel URI.
    pub fn control_uri(&self) -> String {
        format!("{}{}", self.control_origin(), self.control_path())
    }

    /// `http://host:port` of the backend, without a path.
    pub fn backend_origin(&self) -> String {
        format!("http://{}:{}", self.backend_host, self.backend_port)
    }

    /// Full URL of an event endpoint such as `/api/message`.
    pub fn backend_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.backend_origin(), endpoint)
    }
}
