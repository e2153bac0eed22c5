use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use warden_commons::origin_of;

/// Discriminant of a [`Capability`], used for logging and prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityKind {
    ClipboardRead,
    Notifications,
    Fetch,
}

impl CapabilityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClipboardRead => "read-clipboard",
            Self::Notifications => "notifications",
            Self::Fetch => "fetch",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission hosted content can ask for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    ClipboardRead,
    Notifications,
    /// Cross-origin fetch to a serialized origin (`https://host[:port]`).
    Fetch { origin: String },
}

impl Capability {
    /// Fetch capability for the origin of `url`. `None` for opaque origins.
    pub fn fetch(url: &str) -> Option<Self> {
        origin_of(url).map(|origin| Self::Fetch { origin })
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::ClipboardRead => CapabilityKind::ClipboardRead,
            Self::Notifications => CapabilityKind::Notifications,
            Self::Fetch { .. } => CapabilityKind::Fetch,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Fetch { origin } => Some(origin),
            Self::ClipboardRead | Self::Notifications => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { origin } => write!(f, "fetch {origin}"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// What the broker knows about who is asking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    /// URL of the document that made the request, if known.
    pub requesting_url: Option<Url>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a request made by the document at `url`. Unparsable URLs
    /// yield an empty context, which never matches the allow-list.
    pub fn from_url(url: &str) -> Self {
        Self {
            requesting_url: Url::parse(url).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_capability_keeps_only_the_origin() {
        let capability = Capability::fetch("https://Example.com:443/some/path?q=1").unwrap();
        assert_eq!(capability.origin(), Some("https://example.com"));
        assert_eq!(capability.kind(), CapabilityKind::Fetch);
        assert!(Capability::fetch("data:text/plain,hi").is_none());
    }

    #[test]
    fn kinds_render_like_prompt_types() {
        assert_eq!(Capability::ClipboardRead.to_string(), "read-clipboard");
        assert_eq!(
            Capability::fetch("http://localhost:8000/").unwrap().to_string(),
            "fetch http://localhost:8000"
        );
    }
}
