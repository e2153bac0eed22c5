use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use warden_config::DebugConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the filter comes from the `[debug]`
/// section. Returns `false` when tracing is disabled in config and `RUST_LOG`
/// is unset, or when a subscriber was already installed.
pub fn init_tracing(debug: &DebugConfig) -> bool {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if debug.enable_tracing => EnvFilter::new(debug.filter_directive()),
        Err(_) => return false,
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();

    if let Err(err) = init_result {
        tracing::warn!(error = %err, "tracing already initialized; skipping warden tracing setup");
        return false;
    }
    true
}
