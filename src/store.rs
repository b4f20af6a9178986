//! Tape persistence
//!
//! The tape directory behaves like a flat key-value store: one JSON artifact
//! per key, no eviction, overwrites allowed. The store is the only shared
//! mutable resource in the process, so it carries the two pieces of
//! hardening the rest of the system relies on:
//!
//! - writes go to a temporary file in the same directory and are renamed
//!   into place, so a reader never observes a partially written artifact
//! - reads and writes for the same key are serialized through a per-key
//!   async mutex; operations on distinct keys never contend

use crate::error::{Result, TapeError};
use crate::tape::Tape;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Filesystem-backed store mapping tape keys to artifacts
pub struct TapeStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TapeStore {
    /// Create a store rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        TapeStore {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create the tape directory if it does not exist yet
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| TapeError::IoError(format!("cannot create tape directory: {}", e)))
    }

    /// Path of the artifact for a key
    pub fn tape_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Whether an artifact is present for the key
    pub async fn exists(&self, key: &str) -> bool {
        fs::try_exists(self.tape_path(key)).await.unwrap_or(false)
    }

    /// Load and parse the artifact for a key
    ///
    /// # Returns
    /// * `Ok(Some(Tape))` if a well-formed artifact is present
    /// * `Ok(None)` if no artifact exists for the key
    /// * `Err(TapeError::TapeCorrupted)` if an artifact is present but
    ///   cannot be parsed
    pub async fn read(&self, key: &str) -> Result<Option<Tape>> {
        let lock = self.key_lock(key).await;
        let _guard = lock.lock().await;

        let path = self.tape_path(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TapeError::IoError(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let tape = serde_json::from_slice(&raw)
            .map_err(|e| TapeError::TapeCorrupted(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded tape key={} from {}", key, path.display());
        Ok(Some(tape))
    }

    /// Serialize and persist a tape under the key, replacing any existing
    /// artifact
    ///
    /// The artifact is written to a temporary file in the tape directory and
    /// renamed over the final path, so concurrent readers see either the old
    /// complete artifact or the new one, never a torn write.
    pub async fn write(&self, key: &str, tape: &Tape) -> Result<()> {
        let lock = self.key_lock(key).await;
        let _guard = lock.lock().await;

        let json = serde_json::to_vec_pretty(tape)
            .map_err(|e| TapeError::WriteFailure(format!("serialize tape: {}", e)))?;

        let path = self.tape_path(key);
        let tmp = self.temp_path(key);

        fs::write(&tmp, &json)
            .await
            .map_err(|e| TapeError::WriteFailure(format!("write {}: {}", tmp.display(), e)))?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            // Leave no half-published state behind
            let _ = fs::remove_file(&tmp).await;
            return Err(TapeError::WriteFailure(format!(
                "publish {}: {}",
                path.display(),
                e
            )));
        }

        debug!("Wrote tape key={} to {}", key, path.display());
        Ok(())
    }

    /// Directory holding the tape artifacts
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        self.dir.join(format!(".{}.{}.tmp", key, nanos))
    }

    /// Lock guarding all filesystem operations for one key
    ///
    /// Entries are retained for the life of the process: the registry grows
    /// by one small allocation per distinct key ever touched, the same
    /// bound as the number of tape artifacts on disk.
    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}
