use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::constants::loader::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, CONFIG_PATH_ENV};
use crate::loader::config::WardenConfig;
use crate::loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};

/// Configuration manager for loading and validating configurations
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: WardenConfig,
    config_path: Option<PathBuf>,
    layer_stack: ConfigLayerStack,
}

impl ConfigManager {
    /// Load configuration from the default locations.
    ///
    /// `WARDEN_CONFIG_PATH` names an explicit file; otherwise the current
    /// directory is treated as the workspace.
    pub fn load() -> Result<Self> {
        if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
            let trimmed = config_path.trim();
            if !trimmed.is_empty() {
                return Self::load_from_file(trimmed).with_context(|| {
                    format!("Failed to load configuration from {CONFIG_PATH_ENV}={trimmed}")
                });
            }
        }

        Self::load_from_workspace(std::env::current_dir()?)
    }

    /// Per-user config file, e.g. `~/.config/warden/warden.toml`.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from a workspace directory.
    pub fn load_from_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        let workspace_file = workspace.as_ref().join(CONFIG_FILE_NAME);
        Self::load_layers(Self::user_config_path(), Some(workspace_file), None)
    }

    /// Load configuration from a specific file, on top of the user layer.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_layers(
            Self::user_config_path(),
            None,
            Some(path.as_ref().to_path_buf()),
        )
    }

    /// Build the layer stack from the given files, lowest precedence first.
    /// Missing optional layers are skipped; an unreadable optional layer is
    /// logged and skipped; an explicit file must load.
    pub fn load_layers(
        user: Option<PathBuf>,
        workspace: Option<PathBuf>,
        explicit: Option<PathBuf>,
    ) -> Result<Self> {
        let mut layer_stack = ConfigLayerStack::default();

        if let Some(file) = user
            && let Some(toml) = Self::load_optional_layer(&file)
        {
            layer_stack.push(ConfigLayerEntry::new(ConfigLayerSource::User { file }, toml));
        }

        if let Some(file) = workspace
            && let Some(toml) = Self::load_optional_layer(&file)
        {
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Workspace { file },
                toml,
            ));
        }

        if let Some(file) = explicit {
            let toml = Self::load_toml_from_file(&file)?;
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Explicit { file },
                toml,
            ));
        }

        Self::from_layer_stack(layer_stack)
    }

    /// Apply an in-code override on top of the loaded layers.
    pub fn with_runtime_override(mut self, overlay: toml::Value) -> Result<Self> {
        self.layer_stack
            .push(ConfigLayerEntry::new(ConfigLayerSource::Runtime, overlay));
        let rebuilt = Self::from_layer_stack(self.layer_stack)?;
        Ok(Self {
            config_path: self.config_path,
            ..rebuilt
        })
    }

    fn from_layer_stack(layer_stack: ConfigLayerStack) -> Result<Self> {
        if layer_stack.layers().is_empty() {
            let config = WardenConfig::default();
            config
                .validate()
                .context("Default configuration failed validation")?;
            return Ok(Self {
                config,
                config_path: None,
                layer_stack,
            });
        }

        let config: WardenConfig = layer_stack
            .effective_config()
            .try_into()
            .context("Failed to deserialize effective configuration")?;
        config
            .validate()
            .context("Configuration failed validation")?;

        let config_path = layer_stack.last_file().cloned();
        debug!(
            layers = layer_stack.layers().len(),
            path = ?config_path,
            "loaded warden configuration"
        );

        Ok(Self {
            config,
            config_path,
            layer_stack,
        })
    }

    fn load_optional_layer(path: &Path) -> Option<toml::Value> {
        if !path.exists() {
            return None;
        }
        match Self::load_toml_from_file(path) {
            Ok(toml) => Some(toml),
            Err(error) => {
                warn!(path = %path.display(), error = %format!("{error:#}"), "Skipping unreadable config layer");
                None
            }
        }
    }

    fn load_toml_from_file(path: &Path) -> Result<toml::Value> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: toml::Value = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(value)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Consume the manager, keeping only the configuration
    pub fn into_config(self) -> WardenConfig {
        self.config
    }

    /// Path of the highest-precedence file layer, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn layer_stack(&self) -> &ConfigLayerStack {
        &self.layer_stack
    }
}
