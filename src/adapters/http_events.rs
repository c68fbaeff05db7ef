//! HTTP client for the backend event channel.
//!
//! Implements [`BackendPort`]: each report is one `POST` with a JSON body.
//! A fresh connection is opened per request and bounded by the configured
//! timeout, which stays below the watchdog period so a hung backend cannot
//! reset the device.  Nothing is sent while WiFi is down.

use log::{debug, warn};

use crate::app::ports::{BackendPort, DeliveryError};

#[cfg(target_os = "espidf")]
use core::time::Duration;
#[cfg(target_os = "espidf")]
use embedded_svc::http::client::Client;
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::{EspIOError, Write};

pub struct HttpEventClient {
    /// `http://host:port`
    origin: String,
    associated: bool,

    #[cfg(target_os = "espidf")]
    timeout: Duration,

    #[cfg(not(target_os = "espidf"))]
    posts: Vec<(String, String)>,
    #[cfg(not(target_os = "espidf"))]
    reply: Result<u16, DeliveryError>,
}

impl HttpEventClient {
    pub fn new(origin: impl Into<String>, timeout_ms: u64) -> Self {
        let origin = origin.into();
        log::info!("HttpEventClient: backend {} (timeout {} ms)", origin, timeout_ms);
        Self {
            origin,
            associated: false,
            #[cfg(target_os = "espidf")]
            timeout: Duration::from_millis(timeout_ms),
            #[cfg(not(target_os = "espidf"))]
            posts: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            reply: Ok(200),
        }
    }

    /// Track WiFi association; posts are refused while it is `false`.
    pub fn set_associated(&mut self, associated: bool) {
        if associated != self.associated {
            debug!("HttpEventClient: associated={}", associated);
        }
        self.associated = associated;
    }

    #[cfg(target_os = "espidf")]
    fn send(&self, url: &str, body: &str) -> Result<u16, DeliveryError> {
        let connection = EspHttpConnection::new(&Configuration {
            timeout: Some(self.timeout),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("HttpEventClient: connection setup failed: {}", e);
            DeliveryError::Connect
        })?;
        let mut client = Client::wrap(connection);

        let content_length = body.len().to_string();
        let headers = [
            ("content-type", "application/json"),
            ("content-length", content_length.as_str()),
        ];
        let mut request = client.post(url, &headers).map_err(classify)?;
        request.write_all(body.as_bytes()).map_err(classify)?;
        request.flush().map_err(classify)?;
        let response = request.submit().map_err(classify)?;
        Ok(response.status())
    }
}

/// Map an ESP-IDF HTTP failure onto the delivery taxonomy.
#[cfg(target_os = "espidf")]
fn classify(e: EspIOError) -> DeliveryError {
    use esp_idf_svc::sys::{ESP_ERR_HTTP_CONNECT, ESP_ERR_HTTP_EAGAIN, ESP_ERR_TIMEOUT, esp_err_t};

    let code = e.0.code();
    if code == ESP_ERR_HTTP_CONNECT as esp_err_t {
        DeliveryError::Connect
    } else if code == ESP_ERR_HTTP_EAGAIN as esp_err_t || code == ESP_ERR_TIMEOUT as esp_err_t {
        DeliveryError::Timeout
    } else {
        DeliveryError::Io
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpEventClient {
    /// Simulation: what every subsequent post returns.
    pub fn sim_reply(&mut self, reply: Result<u16, DeliveryError>) {
        self.reply = reply;
    }

    /// Simulation: `(url, body)` of every request sent so far.
    pub fn sim_posts(&self) -> &[(String, String)] {
        &self.posts
    }

    fn send(&mut self, url: &str, body: &str) -> Result<u16, DeliveryError> {
        self.posts.push((url.to_owned(), body.to_owned()));
        self.reply
    }
}

impl BackendPort for HttpEventClient {
    fn post(&mut self, endpoint: &str, body: &str) -> Result<u16, DeliveryError> {
        if !self.associated {
            return Err(DeliveryError::NotAssociated);
        }
        let url = format!("{}{}", self.origin, endpoint);
        debug!("HttpEventClient: POST {} ({} bytes)", url, body.len());
        let result = self.send(&url, body);
        if let Err(e) = result {
            warn!("HttpEventClient: POST {} failed: {}", endpoint, e);
        }
        result
    }
}
