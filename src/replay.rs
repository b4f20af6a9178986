//! Replay engine
//!
//! Answers requests purely from the tape store. Never contacts the
//! upstream. Every replayed response carries a marker header so callers can
//! tell replayed traffic from live traffic.

use crate::error::TapeError;
use crate::key::derive_key;
use crate::metrics::TapeMetrics;
use crate::proxy::text_response;
use crate::store::TapeStore;
use crate::tape::Tape;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Name of the header marking a response as served from a tape
pub const TAPE_MARKER_HEADER: &str = "X-Api-Tape";
/// Fixed value of the marker header
pub const TAPE_MARKER_VALUE: &str = "Replayed";

/// Serves previously captured responses from the tape store
pub struct ReplayEngine {
    store: Arc<TapeStore>,
    metrics: Arc<TapeMetrics>,
}

impl ReplayEngine {
    pub fn new(store: Arc<TapeStore>, metrics: Arc<TapeMetrics>) -> Self {
        ReplayEngine { store, metrics }
    }

    /// Answer a request from the store
    ///
    /// - matching tape: stored status, stored headers verbatim, marker
    ///   header, stored body bytes unmodified
    /// - no tape: 404 naming the method and path
    /// - unparsable artifact: 500
    pub async fn replay(&self, method: &str, path: &str) -> Response<Full<Bytes>> {
        let key = derive_key(method, path);

        match self.store.read(&key).await {
            Ok(Some(tape)) => match tape_response(tape) {
                Ok(response) => {
                    info!("REPLAY {} {} (key={})", method, path, key);
                    self.metrics.record_replay_hit();
                    response
                }
                Err(detail) => {
                    error!("CORRUPTED {} {} (key={}): {}", method, path, key, detail);
                    self.metrics.record_replay_corrupted();
                    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Corrupted Tape".to_string())
                }
            },
            Ok(None) => {
                warn!("MISSING {} {} (key={})", method, path, key);
                self.metrics.record_replay_miss();
                let err = TapeError::TapeNotFound {
                    method: method.to_string(),
                    path: path.to_string(),
                };
                text_response(StatusCode::NOT_FOUND, err.to_string())
            }
            Err(err) => {
                error!("CORRUPTED {} {} (key={}): {}", method, path, key, err);
                self.metrics.record_replay_corrupted();
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Corrupted Tape".to_string())
            }
        }
    }
}

/// Reconstruct the HTTP response from a tape
///
/// Headers are applied exactly as captured; content-length and
/// content-encoding are not recomputed or validated against the body.
fn tape_response(tape: Tape) -> std::result::Result<Response<Full<Bytes>>, String> {
    let status = StatusCode::from_u16(tape.status_code)
        .map_err(|_| format!("invalid status code {}", tape.status_code))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in &tape.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder = builder.header(TAPE_MARKER_HEADER, TAPE_MARKER_VALUE);

    // body() surfaces any header name or value that http refuses to
    // represent
    builder
        .body(Full::new(Bytes::from(tape.body)))
        .map_err(|e| e.to_string())
}
