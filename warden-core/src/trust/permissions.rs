//! Browser permission hooks for hosted project windows.
//!
//! The host forwards the engine's permission checks (synchronous) and
//! permission requests (asynchronous) here. Capabilities that need user
//! consent go through the [`TrustBroker`]; device access goes through a
//! [`MediaAccess`] collaborator.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::broker::TrustBroker;
use super::capability::{Capability, PromptContext};
use crate::window::WindowId;

/// Permission names as reported by the embedded browser engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Permission {
    Media,
    WindowPlacement,
    Notifications,
    LocalFonts,
    AccessibilityEvents,
    Fullscreen,
    PointerLock,
    ClipboardRead,
    ClipboardSanitizedWrite,
    Other(String),
}

impl FromStr for Permission {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw {
            "media" => Self::Media,
            "window-placement" => Self::WindowPlacement,
            "notifications" => Self::Notifications,
            "local-fonts" => Self::LocalFonts,
            "accessibility-events" => Self::AccessibilityEvents,
            "fullscreen" => Self::Fullscreen,
            "pointerLock" => Self::PointerLock,
            "clipboard-read" => Self::ClipboardRead,
            "clipboard-sanitized-write" => Self::ClipboardSanitizedWrite,
            other => Self::Other(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Video,
    Other(String),
}

impl From<&str> for MediaType {
    fn from(raw: &str) -> Self {
        match raw {
            "audio" => Self::Audio,
            "video" => Self::Video,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Details attached to a permission check or request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDetails {
    pub is_main_frame: bool,
    /// URL of the requesting document.
    pub requesting_url: Option<String>,
    /// Only present for `media` requests, and not always then.
    pub media_types: Vec<MediaType>,
}

impl PermissionDetails {
    pub fn main_frame() -> Self {
        Self {
            is_main_frame: true,
            ..Self::default()
        }
    }

    fn context(&self) -> PromptContext {
        self.requesting_url
            .as_deref()
            .map(PromptContext::from_url)
            .unwrap_or_default()
    }
}

/// OS-level camera and microphone consent.
#[async_trait]
pub trait MediaAccess: Send + Sync {
    async fn request(&self, window: WindowId, media: &MediaType) -> bool;
}

/// Grants audio and video, refuses anything else. Platforms without a
/// consent API usually already have access.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeMediaAccess;

#[async_trait]
impl MediaAccess for AssumeMediaAccess {
    async fn request(&self, _window: WindowId, media: &MediaType) -> bool {
        matches!(media, MediaType::Audio | MediaType::Video)
    }
}

pub struct PermissionPolicy {
    broker: Arc<TrustBroker>,
    media: Arc<dyn MediaAccess>,
}

impl std::fmt::Debug for PermissionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionPolicy")
            .field("broker", &self.broker)
            .finish_non_exhaustive()
    }
}

impl PermissionPolicy {
    pub fn new(broker: Arc<TrustBroker>, media: Arc<dyn MediaAccess>) -> Self {
        Self { broker, media }
    }

    /// Synchronous permission check.
    pub fn check(&self, window: WindowId, permission: &Permission, details: &PermissionDetails) -> bool {
        if !details.is_main_frame || self.broker.windows().get(window).is_none() {
            return false;
        }
        matches!(
            permission,
            Permission::Media
                | Permission::WindowPlacement
                | Permission::Notifications
                | Permission::LocalFonts
                | Permission::AccessibilityEvents
        )
    }

    /// Asynchronous permission request. May prompt the user.
    pub async fn request(
        &self,
        window: WindowId,
        permission: &Permission,
        details: &PermissionDetails,
    ) -> bool {
        if !details.is_main_frame || self.broker.windows().get(window).is_none() {
            debug!(window = %window, ?permission, "permission request denied for frame");
            return false;
        }

        match permission {
            Permission::Media => {
                for media in &details.media_types {
                    if !self.media.request(window, media).await {
                        debug!(window = %window, ?media, "media access refused");
                        return false;
                    }
                }
                true
            }
            Permission::ClipboardRead => {
                self.broker
                    .request_capability(window, Capability::ClipboardRead, &details.context())
                    .await
            }
            Permission::Notifications => {
                self.broker
                    .request_capability(window, Capability::Notifications, &details.context())
                    .await
            }
            Permission::Fullscreen | Permission::PointerLock | Permission::ClipboardSanitizedWrite => {
                true
            }
            Permission::WindowPlacement
            | Permission::LocalFonts
            | Permission::AccessibilityEvents
            | Permission::Other(_) => false,
        }
    }
}
