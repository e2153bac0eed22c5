use std::collections::HashSet;

use super::capability::Capability;

/// Grants recorded for one window. Grants are monotonic for the window's
/// lifetime and denials are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustState {
    clipboard_read: bool,
    notifications: bool,
    fetch_origins: HashSet<String>,
}

impl TrustState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_satisfied(&self, capability: &Capability) -> bool {
        match capability {
            Capability::ClipboardRead => self.clipboard_read,
            Capability::Notifications => self.notifications,
            Capability::Fetch { origin } => self.fetch_origins.contains(origin),
        }
    }

    pub(crate) fn grant(&mut self, capability: &Capability) {
        match capability {
            Capability::ClipboardRead => self.clipboard_read = true,
            Capability::Notifications => self.notifications = true,
            Capability::Fetch { origin } => {
                self.fetch_origins.insert(origin.clone());
            }
        }
    }

    pub fn clipboard_read(&self) -> bool {
        self.clipboard_read
    }

    pub fn notifications(&self) -> bool {
        self.notifications
    }

    pub fn fetch_origins(&self) -> impl Iterator<Item = &str> {
        self.fetch_origins.iter().map(String::as_str)
    }
}
