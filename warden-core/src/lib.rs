//! Security broker for hosts of untrusted interactive content.
//!
//! Three pieces share this crate:
//!
//! - [`atomic_write`]: serialized, all-or-nothing file persistence with a
//!   process-wide lock per destination path.
//! - [`trust`]: per-window capability arbitration (clipboard read,
//!   notifications, cross-origin fetch) with a grant cache and a prompt queue
//!   that never shows two prompts for one window at once.
//! - [`intercept`]: ordered allow/redirect/deny rules for outbound requests,
//!   plus the response-header hook for relaxed CORS.
//!
//! [`window`] holds the per-window state the last two share, and
//! [`settings`] is the JSON settings store that feeds the CORS toggle.
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_core::trust::{Capability, DenyAllPrompter, PromptContext, TrustBroker};
//! use warden_core::window::WindowRegistry;
//! use warden_config::TrustConfig;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let broker = TrustBroker::new(
//!     &TrustConfig::default(),
//!     Arc::new(WindowRegistry::new()),
//!     Arc::new(DenyAllPrompter),
//! )?;
//! let window = broker.windows().open("tw-editor://./gui/editor");
//! let allowed = broker
//!     .request_capability(window.id(), Capability::Notifications, &PromptContext::new())
//!     .await;
//! assert!(!allowed);
//! # Ok(())
//! # }
//! ```

pub mod atomic_write;
pub mod intercept;
pub mod settings;
pub mod trust;
pub mod window;

pub use atomic_write::{
    AtomicWriteSession, AtomicWriter, Backpressure, WriteFailure, WritePhase, write_file_atomic,
};
pub use intercept::{InterceptedRequest, RequestInterceptor, ResourceCategory, Verdict};
pub use settings::SettingsStore;
pub use trust::{Capability, PromptContext, SecurityPrompter, TrustBroker};
pub use window::{WindowId, WindowRegistry, WindowSession};
