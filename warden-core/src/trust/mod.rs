//! Per-window capability arbitration.
//!
//! Grants are cached for the window's lifetime; denials are not, so asking
//! again after a "no" shows a new prompt. Prompts for one window are shown
//! one at a time in arrival order through its [`PromptLock`].

mod broker;
mod capability;
mod events;
mod permissions;
mod prompt;
mod prompt_lock;
mod state;

pub use broker::TrustBroker;
pub use capability::{Capability, CapabilityKind, PromptContext};
pub use events::{TrustDecision, TrustEvent};
pub use permissions::{
    AssumeMediaAccess, MediaAccess, MediaType, Permission, PermissionDetails, PermissionPolicy,
};
pub use prompt::{DenyAllPrompter, SecurityPrompt, SecurityPrompter};
pub use prompt_lock::{PromptLock, PromptTurn};
pub use state::TrustState;
