//! Hosted project windows and their per-window security state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use warden_commons::origin_of;

use crate::trust::{PromptLock, TrustState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Everything the broker and the interceptor know about one window.
/// Trust grants live here and are changed only through the broker.
#[derive(Debug)]
pub struct WindowSession {
    id: WindowId,
    initial_url: String,
    initial_origin: Option<String>,
    trust: RwLock<TrustState>,
    prompt_lock: Arc<PromptLock>,
    closed: CancellationToken,
}

impl WindowSession {
    fn new(id: WindowId, initial_url: String) -> Self {
        let initial_origin = origin_of(&initial_url);
        Self {
            id,
            initial_url,
            initial_origin,
            trust: RwLock::new(TrustState::default()),
            prompt_lock: Arc::new(PromptLock::new()),
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    /// The URL the window was opened with.
    pub fn initial_url(&self) -> &str {
        &self.initial_url
    }

    pub fn initial_origin(&self) -> Option<&str> {
        self.initial_origin.as_deref()
    }

    /// Snapshot of the current grants.
    pub fn trust(&self) -> TrustState {
        self.trust.read().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Whether a prompt is currently shown for this window.
    pub fn is_prompting(&self) -> bool {
        self.prompt_lock.is_busy()
    }

    /// Requests waiting behind the current prompt.
    pub fn queued_prompts(&self) -> usize {
        self.prompt_lock.queued()
    }

    pub(crate) fn trust_state(&self) -> &RwLock<TrustState> {
        &self.trust
    }

    pub(crate) fn prompt_lock(&self) -> &Arc<PromptLock> {
        &self.prompt_lock
    }

    pub(crate) fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }
}

/// Live windows by id.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: RwLock<HashMap<WindowId, Arc<WindowSession>>>,
    next_id: AtomicU64,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window showing `initial_url`.
    pub fn open(&self, initial_url: impl Into<String>) -> Arc<WindowSession> {
        let id = WindowId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let session = Arc::new(WindowSession::new(id, initial_url.into()));
        self.windows.write().insert(id, Arc::clone(&session));
        debug!(window = %id, url = %session.initial_url, "window opened");
        session
    }

    pub fn get(&self, id: WindowId) -> Option<Arc<WindowSession>> {
        self.windows.read().get(&id).cloned()
    }

    /// Forget a window. Any outstanding prompt resolves to deny and queued
    /// requests return deny without prompting. Returns false for unknown ids.
    pub fn destroy(&self, id: WindowId) -> bool {
        let Some(session) = self.windows.write().remove(&id) else {
            return false;
        };
        session.closed.cancel();
        debug!(window = %id, "window destroyed");
        true
    }

    pub fn len(&self) -> usize {
        self.windows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_cancels_and_forgets() {
        let registry = WindowRegistry::new();
        let window = registry.open("tw-editor://./gui/editor");
        let other = registry.open("https://example.com/project");
        assert_ne!(window.id(), other.id());
        assert_eq!(window.initial_origin(), None);
        assert_eq!(other.initial_origin(), Some("https://example.com"));

        assert!(registry.destroy(window.id()));
        assert!(window.is_closed());
        assert!(registry.get(window.id()).is_none());
        assert!(!registry.destroy(window.id()));
        assert!(!other.is_closed());
        assert_eq!(registry.len(), 1);
    }
}
