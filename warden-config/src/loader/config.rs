use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{AtomicWriteConfig, InterceptConfig, TrustConfig};
use crate::debug::DebugConfig;

/// Effective configuration of the broker
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub atomic_write: AtomicWriteConfig,

    #[serde(default)]
    pub trust: TrustConfig,

    #[serde(default)]
    pub intercept: InterceptConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

impl WardenConfig {
    pub fn validate(&self) -> Result<()> {
        self.atomic_write
            .validate()
            .context("Invalid atomic_write configuration")?;

        self.trust
            .validate()
            .context("Invalid trust configuration")?;

        self.intercept
            .validate()
            .context("Invalid intercept configuration")?;

        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}
