//! Durable, serialized file persistence.
//!
//! Every write to a path goes through that path's entry in a
//! [`WriteLockRegistry`], so writers to the same file are totally ordered by
//! lock acquisition. In atomic mode the data lands in a hidden sibling that
//! is synced and renamed over the destination; readers see either the old
//! content or the complete new content, never a mix.
//!
//! In-place mode (selected explicitly or by [`WriteMode::Auto`] inside a
//! sandbox that forbids rename) keeps the serialization but not the
//! all-or-nothing property.
//!
//! [`WriteMode::Auto`]: warden_config::WriteMode::Auto

mod digest;
mod error;
mod lock;
mod session;

pub use error::{WriteFailure, WritePhase};
pub use lock::{WriteLockGuard, WriteLockRegistry};
pub use session::{AtomicWriteSession, Backpressure, SessionOptions, SessionState};

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use warden_config::AtomicWriteConfig;

/// Entry point for whole-file writes and streaming sessions.
#[derive(Debug, Clone)]
pub struct AtomicWriter {
    registry: Arc<WriteLockRegistry>,
    options: SessionOptions,
    direct_write_fallback: bool,
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new(&AtomicWriteConfig::default())
    }
}

impl AtomicWriter {
    /// A writer sharing the process-wide lock registry.
    pub fn new(config: &AtomicWriteConfig) -> Self {
        Self::with_registry(config, WriteLockRegistry::global())
    }

    pub fn with_registry(config: &AtomicWriteConfig, registry: Arc<WriteLockRegistry>) -> Self {
        Self {
            registry,
            options: SessionOptions::from(config),
            direct_write_fallback: config.direct_write_fallback,
        }
    }

    pub fn registry(&self) -> &Arc<WriteLockRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Start a streaming write. Waits while another session holds `path`.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<AtomicWriteSession, WriteFailure> {
        AtomicWriteSession::open(&self.registry, path.as_ref(), &self.options).await
    }

    /// Replace the contents of `path` with `data`.
    pub async fn write_file(
        &self,
        path: impl AsRef<Path>,
        data: impl Into<Bytes>,
    ) -> Result<(), WriteFailure> {
        let path = path.as_ref();
        let data: Bytes = data.into();

        let failure = match self.write_once(path, data.clone()).await {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };
        if !self.direct_write_fallback || !self.options.atomic {
            return Err(failure);
        }

        warn!(
            path = %path.display(),
            error = %failure,
            "atomic write failed; retrying as a plain write"
        );
        let guard = self.registry.acquire(path).await;
        let retried = tokio::fs::write(path, &data).await;
        guard.release();
        match retried {
            Ok(()) => Ok(()),
            Err(error) => {
                debug!(path = %path.display(), %error, "plain write fallback failed");
                Err(failure)
            }
        }
    }

    async fn write_once(&self, path: &Path, data: Bytes) -> Result<(), WriteFailure> {
        let mut session = self.open(path).await?;
        if !data.is_empty() {
            session.write(data).await?;
        }
        session.finish().await
    }
}

/// Write `data` to `path` atomically with default settings and the global
/// lock registry.
pub async fn write_file_atomic(
    path: impl AsRef<Path>,
    data: impl Into<Bytes>,
) -> Result<(), WriteFailure> {
    AtomicWriter::default().write_file(path, data).await
}
