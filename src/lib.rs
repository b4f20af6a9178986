//! api-tape
//!
//! A small HTTP proxy that records and replays API responses for offline
//! development and repeatable testing. It runs in one of two modes, fixed
//! for the lifetime of the process:
//!
//! - **record**: every request is forwarded to the target API, the full
//!   response is captured, persisted as a "tape" on disk, and mirrored back
//!   to the caller.
//! - **replay**: the target API is never contacted; requests are answered
//!   from previously captured tapes, or rejected with 404 when no tape
//!   matches.
//!
//! A tape is addressed by a key derived from the request method and target
//! path (query string included, bodies and headers excluded), so a recorded
//! exchange is found by any structurally identical later request. Tapes are
//! JSON documents with a base64 body, which keeps binary payloads intact.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use api_tape::{Mode, ProxyConfig, TapeProxy};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProxyConfig {
//!     target: "https://api.github.com".to_string(),
//!     port: 8080,
//!     mode: Mode::Record,
//!     dir: "./tapes".into(),
//! };
//! config.validate()?;
//!
//! let proxy = Arc::new(TapeProxy::new(Arc::new(config))?);
//! proxy.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`derive_key`]: deterministic request-to-key mapping
//! - [`Tape`]: the persisted record of one captured exchange
//! - [`TapeStore`]: flat-directory persistence with atomic publish and
//!   per-key serialization
//! - [`ReplayEngine`] / [`RecordEngine`]: the two playback/capture paths
//! - [`TapeProxy`]: mode dispatcher and HTTP server

pub mod config;
pub mod error;
pub mod key;
pub mod metrics;
pub mod proxy;
pub mod record;
pub mod replay;
pub mod store;
pub mod tape;

// Re-export commonly used types
pub use config::{Mode, ProxyConfig};
pub use error::{Result, TapeError};
pub use key::derive_key;
pub use metrics::{TapeMetrics, TapeMetricsSnapshot};
pub use proxy::TapeProxy;
pub use record::RecordEngine;
pub use replay::{ReplayEngine, TAPE_MARKER_HEADER, TAPE_MARKER_VALUE};
pub use store::TapeStore;
pub use tape::{Tape, TapeMeta};
