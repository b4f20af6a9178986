//! Tape data structures
//!
//! A tape is one captured HTTP exchange, persisted as a JSON document. The
//! body is stored base64 encoded so binary payloads (images, compressed
//! responses) survive the round trip byte for byte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Informational metadata about the captured exchange
///
/// Never consulted for matching; a tape is looked up by its derived key
/// only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapeMeta {
    /// Request target as presented to the proxy (path plus query string)
    pub url: String,
    /// HTTP method, case as received
    pub method: String,
    /// Wall-clock capture time
    pub timestamp: DateTime<Utc>,
}

/// A single captured HTTP exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tape {
    pub meta: TapeMeta,
    /// Upstream HTTP status code
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Upstream headers, copied verbatim. One value per name; a duplicated
    /// name keeps the last value seen.
    pub headers: HashMap<String, String>,
    /// Raw response body bytes, base64 in the persisted form
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl Tape {
    /// Build a tape for an exchange captured at the current wall-clock time
    pub fn capture(
        url: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        Tape {
            meta: TapeMeta {
                url: url.into(),
                method: method.into(),
                timestamp: Utc::now(),
            },
            status_code,
            headers,
            body,
        }
    }
}

/// Serde adapter storing the body as standard base64
mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
