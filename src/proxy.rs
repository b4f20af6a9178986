//! Tape proxy server
//!
//! Owns the hyper accept loop and routes every inbound request to the
//! replay or record engine according to the mode fixed at startup. Each
//! connection is served on its own task; per-request failures never escape
//! their handler.

use crate::config::{Mode, ProxyConfig};
use crate::error::{Result, TapeError};
use crate::metrics::TapeMetrics;
use crate::record::RecordEngine;
use crate::replay::ReplayEngine;
use crate::store::TapeStore;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// The tape proxy: mode dispatcher plus HTTP server
pub struct TapeProxy {
    config: Arc<ProxyConfig>,
    store: Arc<TapeStore>,
    replay: ReplayEngine,
    record: RecordEngine,
    metrics: Arc<TapeMetrics>,
}

impl TapeProxy {
    /// Assemble the proxy from its configuration
    pub fn new(config: Arc<ProxyConfig>) -> Result<Self> {
        let store = Arc::new(TapeStore::new(&config.dir));
        let metrics = Arc::new(TapeMetrics::new());
        let replay = ReplayEngine::new(Arc::clone(&store), Arc::clone(&metrics));
        let record = RecordEngine::new(
            Arc::clone(&config),
            Arc::clone(&store),
            Arc::clone(&metrics),
        )?;

        Ok(TapeProxy {
            config,
            store,
            replay,
            record,
            metrics,
        })
    }

    /// Shared metrics collector
    pub fn metrics(&self) -> Arc<TapeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Ensure the tape directory exists, bind the configured port, and
    /// serve until the process is terminated
    pub async fn start(self: Arc<Self>) -> Result<()> {
        self.store.ensure_dir().await?;

        let addr: SocketAddr = ([0, 0, 0, 0], self.config.port).into();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TapeError::IoError(format!("cannot bind {}: {}", addr, e)))?;

        info!(
            "api-tape listening on http://{} (mode={}, target={}, dir={})",
            addr,
            self.config.mode,
            self.config.target,
            self.config.dir.display()
        );

        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| TapeError::IoError(format!("accept failed: {}", e)))?;
            let io = TokioIo::new(stream);
            let proxy = Arc::clone(&self);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let proxy = Arc::clone(&proxy);
                    async move { proxy.handle(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }

    /// Route one inbound request by the configured mode
    async fn handle(
        &self,
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
        // Request target exactly as presented: path plus query string
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        match self.config.mode {
            Mode::Replay => Ok(self.replay.replay(req.method().as_str(), &path).await),
            Mode::Record => {
                let (parts, body) = req.into_parts();
                let body = body.collect().await?.to_bytes();
                Ok(self
                    .record
                    .record(&parts.method, &path, &parts.headers, body)
                    .await)
            }
        }
    }
}

/// Build a plain-text response
pub(crate) fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
