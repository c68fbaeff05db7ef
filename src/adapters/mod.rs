//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to               |
//! |----------------|--------------------|---------------------------|
//! | `uart`         | PeerLinkPort       | UART1 to the K210         |
//! | `ws_control`   | ControlTransport   | ESP-IDF WebSocket client  |
//! | `http_events`  | BackendPort        | ESP-IDF HTTP client       |
//! | `log_sink`     | EventSink          | Serial log output         |
//! | `nvs`          | ConfigPort         | NVS / in-memory store     |
//! | `time`         | ClockPort          | ESP32 system timer        |
//! | `wifi`         | ConnectivityPort   | ESP-IDF WiFi STA          |
//! | `device_id`    |                    | eFuse factory MAC         |

pub mod device_id;
pub mod http_events;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod uart;
pub(super) mod utils;
pub mod wifi;
pub mod ws_control;
