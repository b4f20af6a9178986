//! Configuration management for the tape proxy
//!
//! Configuration comes from CLI flags, is validated once at startup, and is
//! then passed to every component as an immutable value. Nothing mutates it
//! after the server starts.

use crate::error::{Result, TapeError};
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;

/// Operation mode, fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Forward requests upstream and capture the responses as tapes
    Record,
    /// Serve responses from previously captured tapes; never contact upstream
    Replay,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Record => write!(f, "record"),
            Mode::Replay => write!(f, "replay"),
        }
    }
}

/// Configuration for the tape proxy
#[derive(Debug, Clone, Parser)]
#[command(
    name = "api-tape",
    about = "Record and replay HTTP API responses for offline development",
    version
)]
pub struct ProxyConfig {
    /// Target API base URL (e.g. https://api.github.com)
    #[arg(short, long)]
    pub target: String,

    /// Local server port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Operation mode
    #[arg(short, long, value_enum, default_value_t = Mode::Replay)]
    pub mode: Mode,

    /// Directory to save tapes
    #[arg(short, long, default_value = "./tapes")]
    pub dir: PathBuf,
}

impl ProxyConfig {
    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - target must be a parseable absolute http(s) URL
    /// - port must not be zero
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.target).map_err(|e| {
            TapeError::ConfigError(format!("invalid target URL '{}': {}", self.target, e))
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TapeError::ConfigError(format!(
                    "target URL scheme must be http or https, got '{}'",
                    other
                )));
            }
        }

        if self.port == 0 {
            return Err(TapeError::ConfigError(
                "listen port must not be zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Target base URL with any trailing slash removed, so that joining the
    /// request path never produces a double slash
    pub fn target_base(&self) -> &str {
        self.target.trim_end_matches('/')
    }
}
