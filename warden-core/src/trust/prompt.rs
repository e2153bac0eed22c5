use async_trait::async_trait;

use super::capability::{Capability, PromptContext};
use crate::window::WindowId;

/// One yes/no question for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPrompt {
    pub window: WindowId,
    pub capability: Capability,
    pub context: PromptContext,
}

/// UI collaborator that renders a [`SecurityPrompt`].
///
/// The broker drops the returned future when the window is destroyed, so an
/// implementation does not need to watch for teardown itself; closing the
/// dialog without answering should resolve to `false`.
#[async_trait]
pub trait SecurityPrompter: Send + Sync {
    async fn prompt(&self, prompt: &SecurityPrompt) -> bool;
}

/// Answers every prompt with "deny". Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllPrompter;

#[async_trait]
impl SecurityPrompter for DenyAllPrompter {
    async fn prompt(&self, _prompt: &SecurityPrompt) -> bool {
        false
    }
}
