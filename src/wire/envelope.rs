//! The `{type, timestamp, data}` wrapper shared by both directions of the
//! serial link.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message on the serial link.
///
/// Created fresh per line and discarded after dispatch.  `timestamp` is the
/// producer's local millisecond clock and is never compared across devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, timestamp: u64, data: Value) -> Self {
        Self {
            kind: kind.into(),
            timestamp,
            data,
        }
    }
}
