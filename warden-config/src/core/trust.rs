use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use warden_commons::OriginPattern;

use crate::constants::trust::DEFAULT_ALWAYS_TRUSTED;

/// Trust broker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrustConfig {
    /// First-party origins or host patterns that never need a prompt.
    /// Accepts `https://host`, `host` and `*.host`.
    #[serde(default = "default_always_trusted")]
    pub always_trusted: Vec<String>,

    /// When false, every capability that would need a prompt is denied
    /// without involving the UI.
    #[serde(default = "default_true")]
    pub prompts_enabled: bool,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            always_trusted: default_always_trusted(),
            prompts_enabled: true,
        }
    }
}

impl TrustConfig {
    /// Parsed form of `always_trusted`.
    pub fn trusted_patterns(&self) -> Result<Vec<OriginPattern>> {
        self.always_trusted
            .iter()
            .map(|raw| {
                OriginPattern::parse(raw)
                    .with_context(|| format!("invalid always_trusted entry `{raw}`"))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.trusted_patterns().map(|_| ())
    }
}

fn default_always_trusted() -> Vec<String> {
    DEFAULT_ALWAYS_TRUSTED.iter().map(|o| (*o).to_string()).collect()
}

#[inline]
const fn default_true() -> bool {
    true
}
