fn main() {
    // Compile-time secrets feed `BridgeConfig::default()` via `option_env!`.
    for var in [
        "TBAO_WIFI_SSID",
        "TBAO_WIFI_PASS",
        "TBAO_BACKEND_HOST",
        "TBAO_BACKEND_PORT",
        "TBAO_DEVICE_ID",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
