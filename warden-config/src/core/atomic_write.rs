use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::constants::atomic_write::{
    DEFAULT_HIGH_WATER_MARK_BYTES, DEFAULT_MAILBOX_CAPACITY, DEFAULT_TEMP_PREFIX, SANDBOXED_FS_ENV,
};

/// How a write session reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Write a sibling temporary file and rename it over the destination.
    Atomic,
    /// Truncate and write the destination directly. Writers are still
    /// serialized but a crash mid-write leaves a partial file.
    InPlace,
    /// `InPlace` when the sandboxed-filesystem marker is set, else `Atomic`.
    #[default]
    Auto,
}

impl WriteMode {
    /// Collapse `Auto` into a concrete mode for the current process.
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto => {
                let sandboxed = std::env::var(SANDBOXED_FS_ENV)
                    .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
                    .unwrap_or(false);
                if sandboxed { Self::InPlace } else { Self::Atomic }
            }
            concrete => concrete,
        }
    }

    pub fn is_atomic(self) -> bool {
        matches!(self.resolve(), Self::Atomic)
    }
}

/// Atomic file writer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AtomicWriteConfig {
    #[serde(default)]
    pub mode: WriteMode,

    /// Bytes in flight before `write` reports saturation
    #[serde(default = "default_high_water_mark_bytes")]
    pub high_water_mark_bytes: usize,

    /// Chunks queued per session before `write` waits for the disk
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Prefix of the temporary sibling file
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,

    /// Retry a failed atomic write once as a plain write. This trades the
    /// all-or-nothing guarantee for reliability on unusual filesystems.
    #[serde(default)]
    pub direct_write_fallback: bool,
}

impl Default for AtomicWriteConfig {
    fn default() -> Self {
        Self {
            mode: WriteMode::default(),
            high_water_mark_bytes: default_high_water_mark_bytes(),
            mailbox_capacity: default_mailbox_capacity(),
            temp_prefix: default_temp_prefix(),
            direct_write_fallback: false,
        }
    }
}

impl AtomicWriteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.high_water_mark_bytes == 0 {
            bail!("high_water_mark_bytes must be greater than zero");
        }
        if self.mailbox_capacity == 0 {
            bail!("mailbox_capacity must be greater than zero");
        }
        if self.temp_prefix.is_empty() {
            bail!("temp_prefix must not be empty");
        }
        if self.temp_prefix.contains(['/', '\\']) {
            bail!("temp_prefix must not contain path separators");
        }
        Ok(())
    }
}

fn default_high_water_mark_bytes() -> usize {
    DEFAULT_HIGH_WATER_MARK_BYTES
}

fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

fn default_temp_prefix() -> String {
    DEFAULT_TEMP_PREFIX.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = AtomicWriteConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.high_water_mark_bytes, 5 * 1024 * 1024);
        assert!(!config.direct_write_fallback);
    }

    #[test]
    fn rejects_separator_in_prefix() {
        let config = AtomicWriteConfig {
            temp_prefix: "../tmp".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = AtomicWriteConfig {
            mailbox_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn concrete_modes_resolve_to_themselves() {
        assert_eq!(WriteMode::Atomic.resolve(), WriteMode::Atomic);
        assert_eq!(WriteMode::InPlace.resolve(), WriteMode::InPlace);
        assert!(!WriteMode::InPlace.is_atomic());
    }

    #[test]
    fn mode_parses_snake_case() {
        let config: AtomicWriteConfig = toml::from_str("mode = \"in_place\"").unwrap();
        assert_eq!(config.mode, WriteMode::InPlace);
    }
}
