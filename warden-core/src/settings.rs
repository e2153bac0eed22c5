//! Persistent desktop settings.
//!
//! Stored as JSON under a `v2` key. Files written by older releases use a
//! flat snake_case layout and are migrated on load. Keys this module does not
//! know about are kept as-is and written back on save.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::atomic_write::AtomicWriter;
use crate::intercept::CorsToggle;

const V2_KEY: &str = "v2";
const BYPASS_CORS: &str = "bypassCORS";
const LOCALE: &str = "locale";
const DATA_VERSION: &str = "dataVersion";
const UPDATE_CHECKER: &str = "updateChecker";
const DEFAULT_LOCALE: &str = "en";
const DEFAULT_UPDATE_CHECKER: &str = "stable";

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Map<String, Value>>,
    writer: AtomicWriter,
}

impl SettingsStore {
    /// Read settings from `path`. A missing or corrupt file yields empty
    /// settings.
    pub async fn load(path: impl Into<PathBuf>, writer: AtomicWriter) -> Self {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => parse_settings(&raw).unwrap_or_else(|error| {
                warn!(path = %path.display(), error = %format!("{error:#}"), "ignoring unreadable settings");
                Map::new()
            }),
            Err(error) => {
                debug!(path = %path.display(), %error, "no settings file; using defaults");
                Map::new()
            }
        };
        Self {
            path,
            data: RwLock::new(data),
            writer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist atomically as `{"v2": {...}}`, pretty-printed.
    pub async fn save(&self) -> Result<()> {
        let serialized = {
            let mut root = Map::new();
            root.insert(V2_KEY.to_string(), Value::Object(self.data.read().clone()));
            serde_json::to_string_pretty(&Value::Object(root)).context("failed to serialize settings")?
        };
        self.writer
            .write_file(&self.path, serialized.into_bytes())
            .await
            .with_context(|| format!("failed to save settings to {}", self.path.display()))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.data.write().insert(key.into(), value);
    }

    pub fn bypass_cors(&self) -> bool {
        matches!(self.data.read().get(BYPASS_CORS), Some(Value::Bool(true)))
    }

    pub fn set_bypass_cors(&self, enabled: bool) {
        self.set(BYPASS_CORS, Value::Bool(enabled));
    }

    pub fn locale(&self) -> String {
        self.string_or(LOCALE, DEFAULT_LOCALE)
    }

    pub fn set_locale(&self, locale: impl Into<String>) {
        self.set(LOCALE, Value::String(locale.into()));
    }

    /// Last manual data migration that ran.
    pub fn data_version(&self) -> u64 {
        self.data
            .read()
            .get(DATA_VERSION)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn set_data_version(&self, version: u64) {
        self.set(DATA_VERSION, Value::from(version));
    }

    pub fn update_checker(&self) -> String {
        self.string_or(UPDATE_CHECKER, DEFAULT_UPDATE_CHECKER)
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        match self.data.read().get(key) {
            Some(Value::String(value)) if !value.is_empty() => value.clone(),
            _ => default.to_string(),
        }
    }
}

impl CorsToggle for SettingsStore {
    fn relaxed_cors(&self) -> bool {
        self.bypass_cors()
    }
}

fn parse_settings(raw: &str) -> Result<Map<String, Value>> {
    let parsed: Value = serde_json::from_str(raw).context("settings file is not valid JSON")?;
    let Value::Object(mut root) = parsed else {
        anyhow::bail!("settings file is not a JSON object");
    };
    match root.remove(V2_KEY) {
        Some(Value::Object(v2)) => Ok(v2),
        Some(_) => anyhow::bail!("settings `v2` entry is not an object"),
        None => Ok(migrate_legacy(&root)),
    }
}

/// Flat settings from releases before the `v2` layout.
fn migrate_legacy(legacy: &Map<String, Value>) -> Map<String, Value> {
    let mut options = Map::new();
    if let Some(Value::String(locale)) = legacy.get("locale") {
        options.insert(LOCALE.into(), Value::String(locale.clone()));
    }
    if legacy.get("disable_update_checker") == Some(&Value::Bool(true)) {
        options.insert(UPDATE_CHECKER.into(), Value::String("never".into()));
    }
    if legacy.get("bypass_cors") == Some(&Value::Bool(true)) {
        options.insert(BYPASS_CORS.into(), Value::Bool(true));
    }
    if legacy.get("hardware_acceleration") == Some(&Value::Bool(false)) {
        options.insert("hardwareAcceleration".into(), Value::Bool(false));
    }
    if legacy.get("background_throttling") == Some(&Value::Bool(false)) {
        options.insert("backgroundThrottling".into(), Value::Bool(false));
    }
    if let Some(Value::String(dir)) = legacy.get("last_accessed_directory") {
        options.insert("lastDirectory".into(), Value::String(dir.clone()));
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic_write::WriteLockRegistry;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;
    use warden_config::AtomicWriteConfig;

    fn writer() -> AtomicWriter {
        AtomicWriter::with_registry(&AtomicWriteConfig::default(), Arc::new(WriteLockRegistry::new()))
    }

    #[tokio::test]
    async fn missing_or_corrupt_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let missing = SettingsStore::load(dir.path().join("absent.json"), writer()).await;
        assert_eq!(missing.locale(), "en");
        assert!(!missing.bypass_cors());
        assert_eq!(missing.data_version(), 0);

        let corrupt_path = dir.path().join("corrupt.json");
        std::fs::write(&corrupt_path, "{ not json").unwrap();
        let corrupt = SettingsStore::load(&corrupt_path, writer()).await;
        assert!(corrupt.get(LOCALE).is_none());
    }

    #[tokio::test]
    async fn legacy_layout_is_migrated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tw_config.json");
        std::fs::write(
            &path,
            r#"{"locale":"de","disable_update_checker":true,"bypass_cors":true,
               "hardware_acceleration":false,"background_throttling":true,
               "last_accessed_directory":"/home/user/projects"}"#,
        )
        .unwrap();

        let store = SettingsStore::load(&path, writer()).await;
        assert_eq!(store.locale(), "de");
        assert_eq!(store.update_checker(), "never");
        assert!(store.bypass_cors());
        assert!(store.relaxed_cors());
        assert_eq!(store.get("hardwareAcceleration"), Some(Value::Bool(false)));
        assert_eq!(store.get("backgroundThrottling"), None);
        assert_eq!(
            store.get("lastDirectory"),
            Some(Value::String("/home/user/projects".into()))
        );
    }

    #[tokio::test]
    async fn save_round_trips_and_keeps_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tw_config.json");
        std::fs::write(&path, r#"{"v2":{"camera":"front","dataVersion":2}}"#).unwrap();

        let store = SettingsStore::load(&path, writer()).await;
        assert_eq!(store.data_version(), 2);
        store.set_bypass_cors(true);
        store.set_data_version(3);
        store.save().await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n  \"v2\": {"));
        let reloaded = SettingsStore::load(&path, writer()).await;
        assert!(reloaded.bypass_cors());
        assert_eq!(reloaded.data_version(), 3);
        assert_eq!(reloaded.get("camera"), Some(Value::String("front".into())));
    }
}
