use serde::Serialize;

use super::capability::CapabilityKind;
use crate::window::WindowId;

/// How a capability request was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustDecision {
    /// Matched the always-trusted list.
    AlwaysTrusted,
    /// Same origin as the window's own document.
    SameOrigin,
    /// Already granted earlier in the window's lifetime.
    Cached,
    PromptShown,
    PromptGranted,
    PromptDenied,
    /// The window went away while the request was queued or prompting.
    Cancelled,
    /// Prompts are disabled by configuration.
    PromptsDisabled,
    UnknownWindow,
}

impl TrustDecision {
    pub fn allowed(self) -> bool {
        matches!(
            self,
            Self::AlwaysTrusted | Self::SameOrigin | Self::Cached | Self::PromptGranted
        )
    }
}

/// Audit record emitted to the broker's telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustEvent {
    pub window: u64,
    pub capability: CapabilityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub decision: TrustDecision,
}

impl TrustEvent {
    pub(crate) fn new(
        window: WindowId,
        capability: CapabilityKind,
        origin: Option<&str>,
        decision: TrustDecision,
    ) -> Self {
        Self {
            window: window.get(),
            capability,
            origin: origin.map(str::to_owned),
            decision,
        }
    }
}
