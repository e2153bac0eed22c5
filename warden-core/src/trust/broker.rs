use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};
use url::Url;
use warden_commons::{NoopTelemetry, OriginPattern, TelemetrySink};
use warden_config::TrustConfig;

use super::capability::{Capability, PromptContext};
use super::events::{TrustDecision, TrustEvent};
use super::prompt::{SecurityPrompt, SecurityPrompter};
use crate::window::{WindowId, WindowRegistry, WindowSession};

/// Per-window permission arbitration.
///
/// Decisions never fail: anything that cannot be decided (unknown window,
/// unparsable URL, window torn down mid-prompt) resolves to `false`.
pub struct TrustBroker {
    windows: Arc<WindowRegistry>,
    always_trusted: Vec<OriginPattern>,
    prompts_enabled: bool,
    prompter: Arc<dyn SecurityPrompter>,
    telemetry: Arc<dyn TelemetrySink<TrustEvent>>,
}

impl std::fmt::Debug for TrustBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustBroker")
            .field("always_trusted", &self.always_trusted)
            .field("prompts_enabled", &self.prompts_enabled)
            .finish_non_exhaustive()
    }
}

impl TrustBroker {
    pub fn new(
        config: &TrustConfig,
        windows: Arc<WindowRegistry>,
        prompter: Arc<dyn SecurityPrompter>,
    ) -> Result<Self> {
        Ok(Self {
            windows,
            always_trusted: config.trusted_patterns()?,
            prompts_enabled: config.prompts_enabled,
            prompter,
            telemetry: Arc::new(NoopTelemetry),
        })
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink<TrustEvent>>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn windows(&self) -> &Arc<WindowRegistry> {
        &self.windows
    }

    /// Whether `url` belongs to an origin that never needs a prompt.
    pub fn is_always_trusted(&self, url: &Url) -> bool {
        self.always_trusted.iter().any(|pattern| pattern.matches(url))
    }

    /// Ask for `capability` on behalf of `window`. May wait on the user.
    pub async fn request_capability(
        &self,
        window: WindowId,
        capability: Capability,
        context: &PromptContext,
    ) -> bool {
        if context
            .requesting_url
            .as_ref()
            .is_some_and(|url| self.is_always_trusted(url))
        {
            self.record(window, &capability, TrustDecision::AlwaysTrusted);
            return true;
        }

        let Some(session) = self.windows.get(window) else {
            self.record(window, &capability, TrustDecision::UnknownWindow);
            return false;
        };
        self.arbitrate(&session, capability, context).await
    }

    /// Whether content in `window` may fetch `url`.
    pub async fn can_fetch(&self, window: WindowId, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(window = %window, url, %error, "refusing fetch of unparsable url");
                return false;
            }
        };
        if self.is_always_trusted(&parsed) {
            self.record_fetch(window, url, TrustDecision::AlwaysTrusted);
            return true;
        }

        let Some(session) = self.windows.get(window) else {
            self.record_fetch(window, url, TrustDecision::UnknownWindow);
            return false;
        };
        let Some(capability) = Capability::fetch(url) else {
            debug!(window = %window, url, "fetch target has an opaque origin");
            return false;
        };
        if session.initial_origin() == capability.origin() {
            self.record(window, &capability, TrustDecision::SameOrigin);
            return true;
        }

        let context = PromptContext {
            requesting_url: Some(parsed),
        };
        self.arbitrate(&session, capability, &context).await
    }

    /// Cached check, queue on the prompt lock, re-check, prompt, record.
    async fn arbitrate(
        &self,
        session: &WindowSession,
        capability: Capability,
        context: &PromptContext,
    ) -> bool {
        let window = session.id();
        if session.trust_state().read().is_satisfied(&capability) {
            self.record(window, &capability, TrustDecision::Cached);
            return true;
        }

        let closed = session.closed_token();
        let turn = tokio::select! {
            biased;
            _ = closed.cancelled() => {
                self.record(window, &capability, TrustDecision::Cancelled);
                return false;
            }
            turn = session.prompt_lock().acquire() => turn,
        };

        // A prompt that finished while this request was queued may have
        // granted the same thing.
        if session.trust_state().read().is_satisfied(&capability) {
            turn.release();
            self.record(window, &capability, TrustDecision::Cached);
            return true;
        }

        if !self.prompts_enabled {
            turn.release();
            self.record(window, &capability, TrustDecision::PromptsDisabled);
            return false;
        }

        let prompt = SecurityPrompt {
            window,
            capability: capability.clone(),
            context: context.clone(),
        };
        self.record(window, &capability, TrustDecision::PromptShown);
        let answer = tokio::select! {
            biased;
            _ = closed.cancelled() => None,
            answer = self.prompter.prompt(&prompt) => Some(answer),
        };

        let decision = match answer {
            Some(true) if !closed.is_cancelled() => {
                session.trust_state().write().grant(&capability);
                TrustDecision::PromptGranted
            }
            Some(false) => TrustDecision::PromptDenied,
            Some(true) | None => TrustDecision::Cancelled,
        };
        let satisfied = decision != TrustDecision::Cancelled
            && session.trust_state().read().is_satisfied(&capability);
        turn.release();

        self.record(window, &capability, decision);
        satisfied
    }

    fn record(&self, window: WindowId, capability: &Capability, decision: TrustDecision) {
        debug!(
            window = %window,
            capability = %capability.kind(),
            origin = capability.origin().unwrap_or(""),
            ?decision,
            "trust decision"
        );
        let event = TrustEvent::new(window, capability.kind(), capability.origin(), decision);
        if let Err(error) = self.telemetry.record(&event) {
            warn!(%error, "failed to record trust event");
        }
    }

    fn record_fetch(&self, window: WindowId, url: &str, decision: TrustDecision) {
        match Capability::fetch(url) {
            Some(capability) => self.record(window, &capability, decision),
            None => debug!(window = %window, url, ?decision, "trust decision"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::DenyAllPrompter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_commons::MemoryTelemetry;

    struct CountingPrompter {
        answer: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SecurityPrompter for CountingPrompter {
        async fn prompt(&self, _prompt: &SecurityPrompt) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn broker_with(answer: bool) -> (TrustBroker, Arc<CountingPrompter>) {
        let prompter = Arc::new(CountingPrompter {
            answer,
            calls: AtomicUsize::new(0),
        });
        let broker = TrustBroker::new(
            &TrustConfig::default(),
            Arc::new(WindowRegistry::new()),
            prompter.clone(),
        )
        .unwrap();
        (broker, prompter)
    }

    #[tokio::test]
    async fn always_trusted_origin_skips_the_prompt() {
        let (broker, prompter) = broker_with(false);
        let window = broker.windows().open("tw-editor://./gui/editor");

        assert!(broker.can_fetch(window.id(), "https://extensions.turbowarp.org/a.js").await);
        let context = PromptContext::from_url("https://extensions.turbowarp.org/doc");
        assert!(
            broker
                .request_capability(window.id(), Capability::ClipboardRead, &context)
                .await
        );
        assert_eq!(prompter.calls.load(Ordering::SeqCst), 0);
        assert!(!window.trust().clipboard_read(), "fast path records nothing");
    }

    #[tokio::test]
    async fn same_origin_fetch_is_allowed_without_state() {
        let (broker, prompter) = broker_with(false);
        let window = broker.windows().open("https://example.com/project.html");

        assert!(broker.can_fetch(window.id(), "https://example.com/data.json").await);
        assert_eq!(prompter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(window.trust().fetch_origins().count(), 0);
    }

    #[tokio::test]
    async fn grant_is_cached_and_denial_is_not() {
        let (broker, prompter) = broker_with(true);
        let window = broker.windows().open("tw-editor://./gui/editor");
        let ctx = PromptContext::new();

        assert!(broker.request_capability(window.id(), Capability::ClipboardRead, &ctx).await);
        assert!(broker.request_capability(window.id(), Capability::ClipboardRead, &ctx).await);
        assert_eq!(prompter.calls.load(Ordering::SeqCst), 1);

        let (denying, prompter) = broker_with(false);
        let window = denying.windows().open("tw-editor://./gui/editor");
        assert!(!denying.request_capability(window.id(), Capability::Notifications, &ctx).await);
        assert!(!denying.request_capability(window.id(), Capability::Notifications, &ctx).await);
        assert_eq!(prompter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_prompts_deny_without_asking() {
        let config = TrustConfig {
            prompts_enabled: false,
            ..TrustConfig::default()
        };
        let telemetry: Arc<MemoryTelemetry<TrustEvent>> = Arc::new(MemoryTelemetry::new());
        let broker = TrustBroker::new(
            &config,
            Arc::new(WindowRegistry::new()),
            Arc::new(DenyAllPrompter),
        )
        .unwrap()
        .with_telemetry(telemetry.clone());
        let window = broker.windows().open("tw-editor://./gui/editor");

        assert!(!broker.can_fetch(window.id(), "https://other.com/x").await);
        let decisions: Vec<_> = telemetry.events().iter().map(|e| e.decision).collect();
        assert_eq!(decisions, vec![TrustDecision::PromptsDisabled]);
    }

    #[tokio::test]
    async fn unknown_window_and_bad_urls_are_denied() {
        let (broker, prompter) = broker_with(true);
        assert!(
            !broker
                .request_capability(WindowId::new(99), Capability::ClipboardRead, &PromptContext::new())
                .await
        );
        let window = broker.windows().open("tw-editor://./gui/editor");
        assert!(!broker.can_fetch(window.id(), "not a url").await);
        assert!(!broker.can_fetch(window.id(), "data:text/plain,hello").await);
        assert_eq!(prompter.calls.load(Ordering::SeqCst), 0);
    }
}
