//! T-Bao bridge firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SerialLink      WsControl          HttpEventClient            │
//! │  (PeerLinkPort)  (ControlTransport) (BackendPort)              │
//! │  Esp32Clock      LogEventSink       NvsAdapter   WifiAdapter   │
//! │  (ClockPort)     (EventSink)        (ConfigPort) (Connectivity)│
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                 Relay (pure logic)                     │    │
//! │  │  PeerLink · ControlLink · Pending · Scheduler          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use log::{info, warn};

use tbao_bridge::adapters::device_id;
use tbao_bridge::adapters::http_events::HttpEventClient;
use tbao_bridge::adapters::log_sink::LogEventSink;
use tbao_bridge::adapters::nvs::NvsAdapter;
use tbao_bridge::adapters::time::Esp32Clock;
use tbao_bridge::adapters::uart::SerialLink;
use tbao_bridge::adapters::wifi::{ConnectivityPort, WifiAdapter};
use tbao_bridge::adapters::ws_control::WsControl;
use tbao_bridge::app::events::BridgeEvent;
use tbao_bridge::app::ports::{ClockPort, ConfigPort, EventSink};
use tbao_bridge::app::report::FedBackend;
use tbao_bridge::app::service::{Ports, Relay};
use tbao_bridge::config::BridgeConfig;
use tbao_bridge::drivers::watchdog::Watchdog;
use tbao_bridge::error::Error;
use tbao_bridge::pins;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  T-Bao bridge v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let mut log_sink = LogEventSink::new();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut config = match NvsAdapter::new().and_then(|nvs| nvs.load()) {
        Ok(cfg) => cfg,
        Err(e) => {
            log_sink.emit(&BridgeEvent::Fault(Error::from(e)));
            warn!("Running with build-time defaults");
            BridgeConfig::default()
        }
    };

    // ── 3. Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    config.device_id = device_id::resolve(&config.device_id, &mac);
    info!("Device ID: {}", config.device_id);

    let watchdog = Watchdog::new(config.watchdog_timeout_ms);

    // ── 4. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let serial = SerialLink::new(
        peripherals.uart1,
        peripherals.pins.gpio17,
        peripherals.pins.gpio16,
        config.serial_baud,
    )?;
    info!(
        "Peer link: UART1 TX=GPIO{} RX=GPIO{}",
        pins::PEER_UART_TX_GPIO,
        pins::PEER_UART_RX_GPIO
    );

    // ── 5. WiFi: block until associated ───────────────────────
    let clock = Esp32Clock::new();
    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop)?;
    if let Err(e) = wifi.set_credentials(&config.wifi_ssid, &config.wifi_pass) {
        warn!("WiFi credentials rejected: {}", e);
    }
    if let Err(e) = wifi.connect(clock.now_ms()) {
        warn!("WiFi connect failed: {}", e);
    }
    while !wifi.is_connected() {
        wifi.poll(clock.now_ms());
        watchdog.feed();
        FreeRtos::delay_ms(100);
    }
    info!("WiFi associated (RSSI {:?} dBm)", wifi.rssi());

    // ── 6. Relay ──────────────────────────────────────────────
    let mut http = HttpEventClient::new(config.backend_origin(), config.http_timeout_ms);
    http.set_associated(true);
    let backend = FedBackend::new(http, &watchdog);

    let mut ports = Ports {
        clock,
        peer: serial,
        control: WsControl::new(config.control_origin(), config.http_timeout_ms),
        backend,
    };

    let mut relay = Relay::new(&config, ports.clock.now_ms());
    relay.start(&mut ports, &mut log_sink);

    info!("Bridge ready. Entering relay loop.");

    // ── 7. Relay loop ─────────────────────────────────────────
    loop {
        wifi.poll(ports.clock.now_ms());
        ports.backend.inner_mut().set_associated(wifi.is_connected());

        relay.run_iteration(&mut ports, &mut log_sink);

        watchdog.feed();
        FreeRtos::delay_ms(config.loop_yield_ms);
    }
}
