//! Configuration for the warden security broker.
//!
//! Settings live in `warden.toml` and are resolved from layers: the per-user
//! file, the workspace file, then an explicitly named file, each overriding
//! the previous one table by table. Every field has a default, so an absent
//! or empty file yields a working broker.
//!
//! ```toml
//! [trust]
//! always_trusted = ["https://extensions.turbowarp.org", "*.turbowarp.org"]
//!
//! [atomic_write]
//! mode = "auto"
//! ```

pub mod constants;
pub mod core;
pub mod debug;
pub mod loader;

pub use core::{AtomicWriteConfig, InterceptConfig, TrustConfig, WriteMode};
pub use debug::{DebugConfig, TraceLevel};
pub use loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};
pub use loader::{ConfigManager, WardenConfig};
