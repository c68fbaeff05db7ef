//! Device identity derived from the ESP32 factory MAC address.
//!
//! When no device id is configured the bridge reports as `tbao-xxyyzz`
//! (last 3 bytes of the 6-byte MAC, lowercase hex).  The value is stable
//! across reboots because the MAC is burned into eFuse.

use core::fmt::Write;

/// Fixed-size device id: `tbao-xxyyzz` is 11 chars.
pub type DeviceIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is a valid 6-byte out-buffer.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a fixed, recognisable MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// `tbao-` followed by the last 3 MAC bytes.
pub fn derived_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "tbao-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}

/// The configured id, or the MAC-derived one when none is set.
pub fn resolve(configured: &str, mac: &MacAddress) -> String {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        derived_id(mac).as_str().into()
    } else {
        trimmed.into()
    }
}
