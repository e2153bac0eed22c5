pub mod atomic_write;
pub mod intercept;
pub mod trust;

pub use atomic_write::{AtomicWriteConfig, WriteMode};
pub use intercept::InterceptConfig;
pub use trust::TrustConfig;
