//! Record engine
//!
//! Forwards each request to the configured upstream, buffers the complete
//! response, persists it as a tape, and mirrors the exact same response
//! back to the caller. Recording is transparent: success or failure of the
//! tape write never changes what the client receives.

use crate::config::ProxyConfig;
use crate::error::{Result, TapeError};
use crate::key::derive_key;
use crate::metrics::TapeMetrics;
use crate::proxy::text_response;
use crate::store::TapeStore;
use crate::tape::Tape;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName};
use http::Method;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Headers that describe the connection rather than the exchange; never
/// forwarded upstream. Host is rewritten by the client from the target URL,
/// and the framing headers are recomputed for the buffered body.
fn skip_on_forward(name: &HeaderName) -> bool {
    *name == http::header::HOST
        || *name == http::header::CONNECTION
        || *name == http::header::CONTENT_LENGTH
        || *name == http::header::TRANSFER_ENCODING
        || *name == http::header::UPGRADE
}

/// Captures upstream exchanges and persists them as tapes
pub struct RecordEngine {
    client: reqwest::Client,
    store: Arc<TapeStore>,
    config: Arc<ProxyConfig>,
    metrics: Arc<TapeMetrics>,
}

impl RecordEngine {
    /// Create a record engine with its own upstream HTTP client
    ///
    /// Redirects are not followed, so 3xx responses are captured exactly as
    /// the upstream sent them.
    pub fn new(
        config: Arc<ProxyConfig>,
        store: Arc<TapeStore>,
        metrics: Arc<TapeMetrics>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                TapeError::UpstreamFailure(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(RecordEngine {
            client,
            store,
            config,
            metrics,
        })
    }

    /// Forward a request upstream, persist the captured exchange, and
    /// return the upstream response to the caller
    ///
    /// The upstream body is accumulated into a single buffer before
    /// anything else happens; the tape format needs the complete body, so
    /// streaming-through-while-recording is deliberately not supported.
    pub async fn record(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Response<Full<Bytes>> {
        info!("RECORD {} {}", method, path);

        let url = format!("{}{}", self.config.target_base(), path);

        let mut outbound = reqwest::header::HeaderMap::new();
        for (name, value) in headers {
            if skip_on_forward(name) {
                continue;
            }
            outbound.append(name.clone(), value.clone());
        }

        let upstream = match self
            .client
            .request(method.clone(), &url)
            .headers(outbound)
            .body(body)
            .send()
            .await
        {
            Ok(upstream) => upstream,
            Err(e) => return self.upstream_failed(method, path, e.to_string()),
        };

        let status = upstream.status();
        let upstream_headers = upstream.headers().clone();

        // Accumulate the full body. Content-Encoding-compressed bodies stay
        // compressed; raw bytes are stored as received.
        let body = match upstream.bytes().await {
            Ok(body) => body,
            Err(e) => return self.upstream_failed(method, path, e.to_string()),
        };

        self.persist(method, path, &url, status, &upstream_headers, &body)
            .await;

        // Mirror the buffered upstream response to the caller
        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = upstream_headers;
        response
    }

    /// Write the captured exchange to the store; best-effort relative to
    /// serving the caller
    async fn persist(
        &self,
        method: &Method,
        path: &str,
        url: &str,
        status: StatusCode,
        headers: &HeaderMap,
        body: &Bytes,
    ) {
        let mut captured = HashMap::new();
        for (name, value) in headers {
            // One value per name; a duplicated name keeps the last value
            captured.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        let tape = Tape::capture(path, method.as_str(), status.as_u16(), captured, body.to_vec());

        let key = derive_key(method.as_str(), path);
        match self.store.write(&key, &tape).await {
            Ok(()) => {
                info!("SAVED {} {} -> {} ({} bytes)", method, path, key, body.len());
                self.metrics.record_capture();
            }
            Err(e) => {
                // The caller still gets the real upstream response
                error!("Tape write failed for {} {} (url={}): {}", method, path, url, e);
                self.metrics.record_write_failure();
            }
        }
    }

    fn upstream_failed(&self, method: &Method, path: &str, detail: String) -> Response<Full<Bytes>> {
        warn!("Proxy Error for {} {}: {}", method, path, detail);
        self.metrics.record_upstream_failure();
        text_response(StatusCode::BAD_GATEWAY, "Proxy Error".to_string())
    }
}
