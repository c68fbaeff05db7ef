//! GPIO / peripheral pin assignments for the T-Bao main board.
//!
//! Single source of truth for the wiring between the ESP32 and the K210
//! co-processor.  `main` takes the matching `esp_idf_hal` pins; the numbers
//! here are what the boot log reports.

// ---------------------------------------------------------------------------
// UART1: K210 co-processor link (115200 8N1)
// ---------------------------------------------------------------------------

/// ESP32 TX, wired to the K210 RX.
pub const PEER_UART_TX_GPIO: i32 = 17;
/// ESP32 RX, wired to the K210 TX.
pub const PEER_UART_RX_GPIO: i32 = 16;
