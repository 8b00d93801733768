//! Persisted list of plugin sources

use crate::domain::registry::SourceKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// A configured plugin source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSource {
    /// Unique source id
    pub id: String,

    /// Source kind
    pub kind: SourceKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Directory path, url, or package spec depending on kind
    pub location: String,
}

impl CatalogSource {
    /// A local directory source whose catalog lives at `<dir>/repo.json`
    pub fn file(id: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::File,
            name: None,
            description: None,
            location: dir.as_ref().to_string_lossy().into_owned(),
        }
    }

    /// A remote source serving its catalog document over HTTP
    pub fn url(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::Url,
            name: None,
            description: None,
            location: url.into(),
        }
    }
}

/// Store for the source list, seeded with defaults on first access
#[derive(Debug, Clone)]
pub struct SourceStore {
    path: PathBuf,
    defaults: Vec<CatalogSource>,
}

impl SourceStore {
    /// Create a store over `sources.json` at the given path
    pub fn new(path: impl Into<PathBuf>, defaults: Vec<CatalogSource>) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    /// The default source pair: builtin plugins plus a local custom directory
    pub fn default_sources(builtin_dir: &Path, custom_dir: &Path) -> Vec<CatalogSource> {
        vec![
            CatalogSource {
                name: Some("Builtin plugins".to_string()),
                description: Some("Plugins shipped with the application".to_string()),
                ..CatalogSource::file("builtin", builtin_dir)
            },
            CatalogSource {
                name: Some("Custom plugins".to_string()),
                description: Some("Locally developed plugins".to_string()),
                ..CatalogSource::file("custom", custom_dir)
            },
        ]
    }

    /// Path of the source list document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the source list, writing the defaults on first access
    pub fn load(&self) -> Result<Vec<CatalogSource>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "Seeding default source list");
            self.save(&self.defaults)?;
            return Ok(self.defaults.clone());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Corrupted(format!(
                "source list {} is not valid: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Persist the source list atomically via a sibling temp file
    pub fn save(&self, sources: &[CatalogSource]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(sources)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Add a source, replacing any existing source with the same id
    pub fn add(&self, source: CatalogSource) -> Result<Vec<CatalogSource>> {
        let mut sources = self.load()?;
        sources.retain(|s| s.id != source.id);
        sources.push(source);
        self.save(&sources)?;
        Ok(sources)
    }

    /// Remove a source by id
    pub fn remove(&self, id: &str) -> Result<Vec<CatalogSource>> {
        let mut sources = self.load()?;
        sources.retain(|s| s.id != id);
        self.save(&sources)?;
        Ok(sources)
    }
}
