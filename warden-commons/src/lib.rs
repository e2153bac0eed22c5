//! Shared contracts reused by the warden crates. The goal is to keep
//! `warden-core` free of host wiring: hosts plug their own error monitoring
//! and audit storage in through the traits defined here, and every crate
//! agrees on how paths become lock keys and how URLs become origins.

pub mod errors;
pub mod origin;
pub mod paths;
pub mod telemetry;

pub use errors::{ErrorReporter, MemoryErrorReporter, NoopErrorReporter};
pub use origin::{OriginPattern, origin_of, same_origin};
pub use paths::{lock_key, normalize_path};
pub use telemetry::{MemoryTelemetry, NoopTelemetry, TelemetrySink};
