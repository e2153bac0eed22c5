//! Local asset manifest.
//!
//! Lists the content-addressed assets available offline. The listing is read
//! once per manifest on first use; concurrent callers share that read and the
//! result never changes afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use warden_config::constants::intercept::COMPRESSED_ASSET_SUFFIX;

/// Where the manifest's file names come from.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn list(&self) -> Result<Vec<String>>;
}

/// File names of a directory of cached assets. Compressed copies
/// (`<md5>.<ext>.br`) are listed under their uncompressed name.
#[derive(Debug, Clone)]
pub struct DirectoryManifestSource {
    dir: PathBuf,
}

impl DirectoryManifestSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ManifestSource for DirectoryManifestSource {
    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to read asset directory {}", self.dir.display()))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed to list asset directory {}", self.dir.display()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let name = match name.strip_suffix(COMPRESSED_ASSET_SUFFIX) {
                Some(stripped) => stripped.to_string(),
                None => name,
            };
            names.push(name);
        }
        Ok(names)
    }
}

/// A fixed list, for hosts that ship the manifest and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticManifestSource {
    names: Vec<String>,
}

impl StaticManifestSource {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ManifestSource for StaticManifestSource {
    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }
}

pub struct AssetManifest {
    source: Arc<dyn ManifestSource>,
    entries: OnceCell<Arc<HashMap<String, String>>>,
}

impl std::fmt::Debug for AssetManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManifest")
            .field("loaded", &self.entries.initialized())
            .finish_non_exhaustive()
    }
}

impl AssetManifest {
    pub fn new(source: Arc<dyn ManifestSource>) -> Self {
        Self {
            source,
            entries: OnceCell::new(),
        }
    }

    /// A manifest with no entries; every asset goes to the network.
    pub fn empty() -> Self {
        Self::new(Arc::new(StaticManifestSource::default()))
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.initialized()
    }

    /// The cached asset names, keyed by lowercase `<md5>.<ext>` and mapping
    /// to the name as stored.
    pub async fn entries(&self) -> Arc<HashMap<String, String>> {
        let entries = self
            .entries
            .get_or_init(|| async {
                let names = match self.source.list().await {
                    Ok(names) => names,
                    Err(error) => {
                        warn!(error = %format!("{error:#}"), "asset manifest unavailable; treating as empty");
                        Vec::new()
                    }
                };
                let map: HashMap<String, String> = names
                    .into_iter()
                    .map(|name| (name.to_ascii_lowercase(), name))
                    .collect();
                debug!(assets = map.len(), "asset manifest loaded");
                Arc::new(map)
            })
            .await;
        Arc::clone(entries)
    }

    pub async fn contains(&self, md5ext: &str) -> bool {
        self.entries().await.contains_key(&md5ext.to_ascii_lowercase())
    }

    /// The stored name of `md5ext`, matched case-insensitively.
    pub async fn resolve(&self, md5ext: &str) -> Option<String> {
        self.entries().await.get(&md5ext.to_ascii_lowercase()).cloned()
    }
}
