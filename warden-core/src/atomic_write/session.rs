//! Streaming write sessions.
//!
//! A session is a small actor: the caller holds an [`AtomicWriteSession`]
//! handle that feeds chunks into a bounded mailbox, and a worker task owns
//! the file, the temporary path and the write lock. The worker moves through
//! `Idle -> Writing -> Finished | Errored` and is the only place the lock is
//! released, so every way a session can end (finish, abort, I/O error, or the
//! handle being dropped) releases it exactly once.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::{Builder, TempPath};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use warden_config::AtomicWriteConfig;
use warden_config::constants::atomic_write::DEFAULT_FILE_MODE;

use super::digest::same_contents;
use super::error::{WriteFailure, WritePhase};
use super::lock::{WriteLockGuard, WriteLockRegistry};

/// Signal returned by [`AtomicWriteSession::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Keep writing.
    Ready,
    /// The bytes waiting for the disk reached the high-water mark; callers
    /// doing flow control should await [`AtomicWriteSession::drained`].
    Saturated,
}

impl Backpressure {
    pub fn is_saturated(self) -> bool {
        matches!(self, Self::Saturated)
    }
}

/// Lifecycle of a session as seen by its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Writing,
    Finished,
    Errored,
}

/// Per-session tunables, derived from [`AtomicWriteConfig`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Write through a temporary sibling and rename. When false the
    /// destination is truncated and written in place, which is not atomic.
    pub atomic: bool,
    pub high_water_mark: usize,
    pub mailbox_capacity: usize,
    pub temp_prefix: String,
}

impl From<&AtomicWriteConfig> for SessionOptions {
    fn from(config: &AtomicWriteConfig) -> Self {
        Self {
            atomic: config.mode.is_atomic(),
            high_water_mark: config.high_water_mark_bytes,
            mailbox_capacity: config.mailbox_capacity,
            temp_prefix: config.temp_prefix.clone(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&AtomicWriteConfig::default())
    }
}

enum Command {
    Chunk(Bytes),
    Finish,
    Abort(String),
}

#[derive(Debug, Default)]
struct InFlight {
    bytes: AtomicUsize,
    notify: Notify,
}

impl InFlight {
    fn add(&self, len: usize) -> usize {
        self.bytes.fetch_add(len, Ordering::AcqRel) + len
    }

    fn sub(&self, len: usize) {
        self.bytes.fetch_sub(len, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    fn clear(&self) {
        self.bytes.store(0, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn get(&self) -> usize {
        self.bytes.load(Ordering::Acquire)
    }
}

/// Handle to an open write session.
///
/// Dropping the handle without calling [`finish`](Self::finish) aborts the
/// session: the temporary file is removed and the destination is left as it
/// was.
#[derive(Debug)]
pub struct AtomicWriteSession {
    destination: PathBuf,
    mailbox: mpsc::Sender<Command>,
    worker: Option<JoinHandle<Result<(), WriteFailure>>>,
    in_flight: Arc<InFlight>,
    state: Arc<Mutex<SessionState>>,
    high_water_mark: usize,
    atomic: bool,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chunk(bytes) => write!(f, "Chunk({} bytes)", bytes.len()),
            Self::Finish => f.write_str("Finish"),
            Self::Abort(reason) => write!(f, "Abort({reason})"),
        }
    }
}

impl AtomicWriteSession {
    /// Take the write lock for `path` (queueing behind other writers) and
    /// open the file the session will write to.
    pub async fn open(
        registry: &Arc<WriteLockRegistry>,
        path: &Path,
        options: &SessionOptions,
    ) -> Result<Self, WriteFailure> {
        let destination = path.to_path_buf();
        let lock = registry.acquire(&destination).await;

        let mode = original_mode(&destination).await;
        let (file, temp) = if options.atomic {
            let (file, temp) = create_temp_sibling(&destination, &options.temp_prefix, mode).await?;
            (file, Some(temp))
        } else {
            (open_in_place(&destination, mode).await?, None)
        };

        debug!(
            path = %destination.display(),
            atomic = options.atomic,
            temp = ?temp.as_deref(),
            "opened write session"
        );

        let (mailbox, receiver) = mpsc::channel(options.mailbox_capacity.max(1));
        let in_flight = Arc::new(InFlight::default());
        let state = Arc::new(Mutex::new(SessionState::Idle));
        let worker = SessionWorker {
            destination: destination.clone(),
            file: Some(file),
            temp,
            lock,
            in_flight: Arc::clone(&in_flight),
            state: Arc::clone(&state),
        };
        let handle = tokio::spawn(worker.run(receiver));

        Ok(Self {
            destination,
            mailbox,
            worker: Some(handle),
            in_flight,
            state,
            high_water_mark: options.high_water_mark,
            atomic: options.atomic,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Whether this session will replace the destination with a rename.
    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Bytes accepted but not yet written to the file.
    pub fn buffered_bytes(&self) -> usize {
        self.in_flight.get()
    }

    /// Queue a chunk. Waits only when the mailbox is full; the returned
    /// signal reports whether the byte high-water mark was reached.
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> Result<Backpressure, WriteFailure> {
        let chunk: Bytes = chunk.into();
        let len = chunk.len();
        let buffered = self.in_flight.add(len);
        if self.mailbox.send(Command::Chunk(chunk)).await.is_err() {
            self.in_flight.sub(len);
            return Err(self.worker_failure().await);
        }

        if buffered >= self.high_water_mark {
            Ok(Backpressure::Saturated)
        } else {
            Ok(Backpressure::Ready)
        }
    }

    /// Wait until the buffered bytes fall below the high-water mark.
    pub async fn drained(&self) {
        loop {
            let notified = self.in_flight.notify.notified();
            if self.in_flight.get() < self.high_water_mark {
                return;
            }
            notified.await;
        }
    }

    /// Flush to stable storage, swap the file into place and release the lock.
    pub async fn finish(mut self) -> Result<(), WriteFailure> {
        if self.mailbox.send(Command::Finish).await.is_err() {
            return Err(self.worker_failure().await);
        }
        self.join_worker().await
    }

    /// Discard everything written so far. The destination keeps its previous
    /// content (in atomic mode) and the lock passes to the next writer.
    pub async fn abort(mut self, cause: impl Into<String>) {
        let cause = cause.into();
        if self.mailbox.send(Command::Abort(cause)).await.is_err() {
            debug!(path = %self.destination.display(), "abort after session already ended");
        }
        if let Err(failure) = self.join_worker().await
            && !failure.is_aborted()
        {
            debug!(path = %self.destination.display(), error = %failure, "session failed before abort");
        }
    }

    async fn join_worker(&mut self) -> Result<(), WriteFailure> {
        let Some(handle) = self.worker.take() else {
            return Err(WriteFailure::SessionClosed {
                path: self.destination.clone(),
            });
        };
        match handle.await {
            Ok(result) => result,
            Err(error) => {
                warn!(path = %self.destination.display(), %error, "write session worker panicked");
                Err(WriteFailure::SessionClosed {
                    path: self.destination.clone(),
                })
            }
        }
    }

    /// The error that made the worker stop accepting commands.
    async fn worker_failure(&mut self) -> WriteFailure {
        match self.join_worker().await {
            Err(failure) => failure,
            Ok(()) => WriteFailure::SessionClosed {
                path: self.destination.clone(),
            },
        }
    }
}

struct SessionWorker {
    destination: PathBuf,
    file: Option<File>,
    temp: Option<TempPath>,
    lock: WriteLockGuard,
    in_flight: Arc<InFlight>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionWorker {
    async fn run(mut self, mut mailbox: mpsc::Receiver<Command>) -> Result<(), WriteFailure> {
        let outcome = self.drive(&mut mailbox).await;
        mailbox.close();
        drop(mailbox);

        match &outcome {
            Ok(()) => {
                *self.state.lock() = SessionState::Finished;
                debug!(path = %self.destination.display(), "write session finished");
            }
            Err(failure) => {
                *self.state.lock() = SessionState::Errored;
                self.cleanup();
                if failure.is_aborted() {
                    debug!(path = %self.destination.display(), error = %failure, "write session aborted");
                } else {
                    warn!(path = %self.destination.display(), error = %failure, "write session failed");
                }
            }
        }

        self.in_flight.clear();
        self.lock.release();
        outcome
    }

    async fn drive(&mut self, mailbox: &mut mpsc::Receiver<Command>) -> Result<(), WriteFailure> {
        while let Some(command) = mailbox.recv().await {
            match command {
                Command::Chunk(chunk) => {
                    *self.state.lock() = SessionState::Writing;
                    let result = self.write_chunk(&chunk).await;
                    self.in_flight.sub(chunk.len());
                    result?;
                }
                Command::Finish => return self.commit().await,
                Command::Abort(reason) => {
                    return Err(WriteFailure::Aborted {
                        path: self.destination.clone(),
                        reason,
                    });
                }
            }
        }

        Err(WriteFailure::Aborted {
            path: self.destination.clone(),
            reason: "session dropped before finish".to_string(),
        })
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), WriteFailure> {
        let Some(file) = self.file.as_mut() else {
            return Err(WriteFailure::SessionClosed {
                path: self.destination.clone(),
            });
        };
        file.write_all(chunk)
            .await
            .map_err(|error| WriteFailure::io(&self.destination, WritePhase::Write, error))
    }

    async fn commit(&mut self) -> Result<(), WriteFailure> {
        let Some(mut file) = self.file.take() else {
            return Err(WriteFailure::SessionClosed {
                path: self.destination.clone(),
            });
        };
        file.flush()
            .await
            .map_err(|error| WriteFailure::io(&self.destination, WritePhase::Write, error))?;
        file.sync_all()
            .await
            .map_err(|error| WriteFailure::io(&self.destination, WritePhase::Sync, error))?;
        drop(file);

        if let Some(temp) = self.temp.take() {
            rename_into_place(temp, &self.destination).await?;
        }
        Ok(())
    }

    /// Close the descriptor and remove the temporary file, best effort.
    fn cleanup(&mut self) {
        self.file = None;
        if let Some(temp) = self.temp.take() {
            let temp_display = temp.display().to_string();
            if let Err(error) = temp.close() {
                debug!(temp = %temp_display, %error, "failed to remove temporary file");
            }
        }
    }
}

/// Permission bits of the existing destination, or the default for new files.
async fn original_mode(path: &Path) -> u32 {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => mode_bits(&metadata),
        Err(_) => DEFAULT_FILE_MODE,
    }
}

#[cfg(unix)]
fn mode_bits(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(_metadata: &std::fs::Metadata) -> u32 {
    DEFAULT_FILE_MODE
}

/// Create a hidden, randomly named sibling so the final rename stays on the
/// same volume.
async fn create_temp_sibling(
    destination: &Path,
    prefix: &str,
    mode: u32,
) -> Result<(File, TempPath), WriteFailure> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            WriteFailure::io(
                destination,
                WritePhase::Open,
                io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"),
            )
        })?;
    let temp_prefix = format!("{prefix}{file_name}.");

    let created = tokio::task::spawn_blocking(move || {
        let mut builder = Builder::new();
        builder.prefix(&temp_prefix).suffix(".tmp").rand_bytes(6);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(mode));
        }
        #[cfg(not(unix))]
        let _ = mode;
        builder.tempfile_in(&parent)
    })
    .await
    .map_err(io::Error::other)
    .and_then(|result| result)
    .map_err(|error| WriteFailure::io(destination, WritePhase::Open, error))?;

    let (std_file, temp_path) = created.into_parts();
    Ok((File::from_std(std_file), temp_path))
}

async fn open_in_place(destination: &Path, mode: u32) -> Result<File, WriteFailure> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    options
        .open(destination)
        .await
        .map_err(|error| WriteFailure::io(destination, WritePhase::Open, error))
}

async fn rename_into_place(temp: TempPath, destination: &Path) -> Result<(), WriteFailure> {
    let target = destination.to_path_buf();
    let persisted = tokio::task::spawn_blocking(move || temp.persist(&target))
        .await
        .map_err(|error| WriteFailure::io(destination, WritePhase::Rename, io::Error::other(error)))?;

    let Err(persist_error) = persisted else {
        return Ok(());
    };
    let temp = persist_error.path;
    let error = persist_error.error;

    if cfg!(windows)
        && error.kind() == io::ErrorKind::PermissionDenied
        && same_contents(destination, &temp).await
    {
        debug!(path = %destination.display(), "rename reported failure but contents landed");
        if let Err(remove_error) = temp.close() {
            debug!(path = %destination.display(), error = %remove_error, "failed to remove temporary file");
        }
        return Ok(());
    }

    Err(WriteFailure::io(destination, WritePhase::Rename, error))
}
