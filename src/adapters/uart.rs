//! Serial link to the K210 co-processor.
//!
//! Implements [`PeerLinkPort`] over UART1 (8N1, baud from config).  Reads
//! never block: whatever the driver's RX ring buffer holds is returned and an
//! empty buffer reads as `Ok(0)`.  Writes hand the whole line to the driver's
//! TX ring buffer; a short write is reported as an I/O error.
//!
//! On host builds the link is an in-memory loopback so the relay can be
//! driven from tests.

use log::info;

use crate::app::ports::{LinkError, PeerLinkPort};

#[cfg(target_os = "espidf")]
use esp_idf_hal::{
    delay::NON_BLOCK,
    gpio::{AnyIOPin, InputPin, OutputPin},
    peripheral::Peripheral,
    uart::{UartDriver, config::Config},
    units::Hertz,
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

pub struct SerialLink {
    #[cfg(target_os = "espidf")]
    driver: UartDriver<'static>,

    #[cfg(not(target_os = "espidf"))]
    inbound: VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    written: Vec<String>,
    #[cfg(not(target_os = "espidf"))]
    refuse_writes: bool,
}

#[cfg(target_os = "espidf")]
impl SerialLink {
    /// Install the UART driver on `uart` with the given pins.
    pub fn new(
        uart: impl Peripheral<P = esp_idf_hal::uart::UART1> + 'static,
        tx: impl Peripheral<P = impl OutputPin> + 'static,
        rx: impl Peripheral<P = impl InputPin> + 'static,
        baud: u32,
    ) -> Result<Self, EspError> {
        let config = Config::new().baudrate(Hertz(baud));
        let driver = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;
        info!("SerialLink: UART1 up at {} baud", baud);
        Ok(Self { driver })
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SerialLink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl SerialLink {
    pub fn new() -> Self {
        info!("SerialLink: simulation backend");
        Self {
            inbound: VecDeque::new(),
            written: Vec::new(),
            refuse_writes: false,
        }
    }

    /// Simulation: bytes the peer "sent".
    pub fn sim_inject(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Simulation: lines written so far, oldest first.  Clears the log.
    pub fn sim_take_written(&mut self) -> Vec<String> {
        core::mem::take(&mut self.written)
    }

    /// Simulation: make every write fail with [`LinkError::WouldBlock`].
    pub fn sim_refuse_writes(&mut self, refuse: bool) {
        self.refuse_writes = refuse;
    }
}

impl PeerLinkPort for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        #[cfg(target_os = "espidf")]
        {
            match self.driver.read(buf, NON_BLOCK) {
                Ok(n) => Ok(n),
                Err(e) if e.code() == esp_idf_svc::sys::ESP_ERR_TIMEOUT as esp_idf_svc::sys::esp_err_t => Ok(0),
                Err(e) => {
                    warn!("SerialLink: read failed: {}", e);
                    Err(LinkError::Io)
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let n = buf.len().min(self.inbound.len());
            for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        #[cfg(target_os = "espidf")]
        {
            match self.driver.write(line.as_bytes()) {
                Ok(n) if n == line.len() => Ok(()),
                Ok(n) => {
                    warn!("SerialLink: short write {}/{} bytes", n, line.len());
                    Err(LinkError::Io)
                }
                Err(e) => {
                    warn!("SerialLink: write failed: {}", e);
                    Err(LinkError::Io)
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            if self.refuse_writes {
                return Err(LinkError::WouldBlock);
            }
            self.written.push(line.to_owned());
            Ok(())
        }
    }
}
