//! Process-wide FIFO write locks keyed by canonical destination path.
//!
//! An entry exists in the registry exactly while its path is held. The entry
//! carries the queue of tasks waiting for the path; releasing hands the lock
//! to the oldest live waiter, or removes the entry when nobody is waiting, so
//! the registry never grows beyond the set of paths currently being written.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{trace, warn};
use warden_commons::lock_key;

static GLOBAL_REGISTRY: Lazy<Arc<WriteLockRegistry>> =
    Lazy::new(|| Arc::new(WriteLockRegistry::new()));

/// [`lock_key`] canonicalizes through the filesystem; run it on the blocking pool.
async fn resolve_key(path: &Path) -> String {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || lock_key(&owned)).await {
        Ok(key) => key,
        Err(error) => {
            warn!(path = %path.display(), %error, "lock key task failed; resolving inline");
            lock_key(path)
        }
    }
}

/// Registry of held write locks.
#[derive(Debug, Default)]
pub struct WriteLockRegistry {
    queues: Mutex<HashMap<String, VecDeque<oneshot::Sender<()>>>>,
}

impl WriteLockRegistry {
    /// A registry independent of the process-wide one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every window of the process.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Wait until `path` is free and take it.
    pub async fn acquire(self: &Arc<Self>, path: &Path) -> WriteLockGuard {
        let key = resolve_key(path).await;
        self.acquire_key(key).await
    }

    pub(crate) async fn acquire_key(self: &Arc<Self>, key: String) -> WriteLockGuard {
        loop {
            let receiver = {
                let mut queues = self.queues.lock();
                match queues.get_mut(&key) {
                    Some(waiters) => {
                        let (sender, receiver) = oneshot::channel();
                        waiters.push_back(sender);
                        Some(receiver)
                    }
                    None => {
                        queues.insert(key.clone(), VecDeque::new());
                        None
                    }
                }
            };

            let Some(receiver) = receiver else {
                break;
            };

            trace!(key = %key, "write lock contended; queueing");
            let mut pending = PendingHandoff {
                registry: Arc::clone(self),
                key: key.clone(),
                receiver: Some(receiver),
            };
            if pending.wait().await {
                break;
            }
        }

        WriteLockGuard {
            registry: Arc::clone(self),
            key,
            released: false,
        }
    }

    /// Pass the lock to the next live waiter or drop the entry.
    fn release(&self, key: &str) {
        let mut queues = self.queues.lock();
        let Some(waiters) = queues.get_mut(key) else {
            warn!(key = %key, "released a write lock that was not held");
            return;
        };

        while let Some(next) = waiters.pop_front() {
            // A waiter whose future was dropped has closed its receiver.
            if next.send(()).is_ok() {
                return;
            }
        }
        queues.remove(key);
    }

    /// Whether some session currently holds `path`.
    pub fn is_locked(&self, path: &Path) -> bool {
        self.queues.lock().contains_key(&lock_key(path))
    }

    /// Number of tasks queued behind the holder of `path`.
    pub fn waiting(&self, path: &Path) -> usize {
        self.queues
            .lock()
            .get(&lock_key(path))
            .map_or(0, VecDeque::len)
    }

    /// Number of paths currently held.
    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.lock().is_empty()
    }
}

/// A queued acquisition. If the waiting future is dropped after the lock was
/// already handed to it, the lock is passed on instead of being lost.
struct PendingHandoff {
    registry: Arc<WriteLockRegistry>,
    key: String,
    receiver: Option<oneshot::Receiver<()>>,
}

impl PendingHandoff {
    /// `true` once the lock was handed over.
    async fn wait(&mut self) -> bool {
        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };
        let handed_over = receiver.await.is_ok();
        self.receiver = None;
        handed_over
    }
}

impl Drop for PendingHandoff {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            if receiver.try_recv().is_ok() {
                self.registry.release(&self.key);
            }
        }
    }
}

/// Ownership of a path's write lock. Released exactly once, either through
/// [`WriteLockGuard::release`] or on drop.
#[derive(Debug)]
pub struct WriteLockGuard {
    registry: Arc<WriteLockRegistry>,
    key: String,
    released: bool,
}

impl WriteLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.key);
        }
    }
}

impl Drop for WriteLockGuard {
    fn drop(&mut self) {
        self.release_once();
    }
}
