use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use warden_commons::origin_of;

use crate::constants::intercept::{
    DEFAULT_ASSET_ORIGINS, DEFAULT_EXTENSION_ORIGIN, DEFAULT_EXTENSION_SCHEME,
    DEFAULT_LIBRARY_SCHEME,
};

/// Outbound request filtering configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterceptConfig {
    /// Content-addressed asset CDNs whose files may be served from disk
    #[serde(default = "default_asset_origins")]
    pub asset_origins: Vec<String>,

    /// Extension library origin, always served from the offline cache
    #[serde(default = "default_extension_origin")]
    pub extension_origin: String,

    /// Scheme serving locally cached assets
    #[serde(default = "default_library_scheme")]
    pub library_scheme: String,

    /// Scheme serving the offline extension cache
    #[serde(default = "default_extension_scheme")]
    pub extension_scheme: String,

    /// Directory listing the locally cached asset files
    #[serde(default)]
    pub library_dir: Option<PathBuf>,

    /// Let developer tools load their own resources
    #[serde(default = "default_true")]
    pub allow_devtools: bool,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            asset_origins: default_asset_origins(),
            extension_origin: default_extension_origin(),
            library_scheme: default_library_scheme(),
            extension_scheme: default_extension_scheme(),
            library_dir: None,
            allow_devtools: true,
        }
    }
}

impl InterceptConfig {
    /// Asset origins in serialized form (`https://host`).
    pub fn normalized_asset_origins(&self) -> Result<Vec<String>> {
        self.asset_origins
            .iter()
            .map(|raw| normalize_origin(raw).context("invalid asset_origins entry"))
            .collect()
    }

    pub fn normalized_extension_origin(&self) -> Result<String> {
        normalize_origin(&self.extension_origin).context("invalid extension_origin")
    }

    pub fn validate(&self) -> Result<()> {
        self.normalized_asset_origins()?;
        self.normalized_extension_origin()?;
        validate_scheme(&self.library_scheme).context("invalid library_scheme")?;
        validate_scheme(&self.extension_scheme).context("invalid extension_scheme")?;
        Ok(())
    }
}

fn normalize_origin(raw: &str) -> Result<String> {
    origin_of(raw.trim()).with_context(|| format!("`{raw}` is not an origin"))
}

/// `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`
fn validate_scheme(scheme: &str) -> Result<()> {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => bail!("scheme `{scheme}` must start with a letter"),
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
    {
        bail!("scheme `{scheme}` contains `{bad}`");
    }
    Ok(())
}

fn default_asset_origins() -> Vec<String> {
    DEFAULT_ASSET_ORIGINS.iter().map(|o| (*o).to_string()).collect()
}

fn default_extension_origin() -> String {
    DEFAULT_EXTENSION_ORIGIN.to_string()
}

fn default_library_scheme() -> String {
    DEFAULT_LIBRARY_SCHEME.to_string()
}

fn default_extension_scheme() -> String {
    DEFAULT_EXTENSION_SCHEME.to_string()
}

#[inline]
const fn default_true() -> bool {
    true
}
