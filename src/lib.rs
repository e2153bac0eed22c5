//! # warden
//!
//! Security broker for desktop hosts that run untrusted, user-supplied
//! interactive content. It keeps three promises:
//!
//! - **Saves are all-or-nothing.** Writes to a path are serialized
//!   process-wide and land through a synced temporary sibling and a rename.
//! - **Hosted content asks before it reaches further.** Clipboard reads,
//!   notifications and cross-origin fetches go through a per-window broker
//!   that shows at most one prompt at a time and remembers only approvals.
//! - **Outbound requests are filtered.** Navigation is pinned to the
//!   window's initial URL, cached library assets are served offline, and
//!   every other request is either trusted for fetch or denied.
//!
//! Configuration lives in `warden.toml` (see [`warden_config`]); the pieces
//! themselves are in [`warden_core`]. This crate wires them together.
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden::{Warden, init_tracing};
//! use warden_config::ConfigManager;
//! use warden_core::intercept::{InterceptedRequest, ResourceCategory};
//! use warden_core::trust::DenyAllPrompter;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ConfigManager::load()?.into_config();
//! init_tracing(&config.debug);
//!
//! let warden = Warden::new(config, Arc::new(DenyAllPrompter))?;
//! let window = warden.open_window("tw-editor://./gui/editor");
//! let verdict = warden
//!     .classify(&InterceptedRequest::new(
//!         window.id(),
//!         "https://example.com/script.js",
//!         ResourceCategory::Script,
//!     ))
//!     .await;
//! println!("{verdict}");
//! warden.write_file_atomic("project.sb3", b"...".to_vec()).await?;
//! # Ok(())
//! # }
//! ```

mod logging;
mod runtime;

pub use logging::init_tracing;
pub use runtime::{Warden, WardenBuilder};
