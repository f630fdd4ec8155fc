use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DEFAULT_MODELS: &str = include_str!("whisper.toml");
const DEFAULT_EXTENSION: &str = "pt";

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    extension: Option<String>,
    #[serde(default)]
    models: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub url: String,
}

/// Maps a model descriptor to the URL of its checkpoint.
pub trait ModelCatalog: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;

    /// Every known descriptor, sorted.
    fn names(&self) -> Vec<String>;

    /// File extension of the downloaded artifacts, without the dot.
    fn extension(&self) -> &str {
        DEFAULT_EXTENSION
    }
}

/// Catalog backed by a fixed table, by default the upstream whisper checkpoints.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    extension: String,
    models: HashMap<String, CatalogEntry>,
}

impl StaticCatalog {
    pub fn new() -> Result<Self> {
        Self::from_toml_str(DEFAULT_MODELS).context("Built-in model catalog is invalid")
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: CatalogFile = toml::from_str(content)?;
        let mut catalog = Self::from_entries(
            parsed.extension.as_deref().unwrap_or(DEFAULT_EXTENSION),
            Vec::new(),
        );
        catalog.merge(parsed);
        Ok(catalog)
    }

    pub fn from_entries(extension: &str, entries: Vec<CatalogEntry>) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
            models: entries.into_iter().map(|e| (e.name.clone(), e)).collect(),
        }
    }

    /// Layer the entries of a user catalog file over this one.
    pub fn with_overrides(mut self, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read catalog {}", path.display()))?;
        let parsed: CatalogFile = toml::from_str(&content)
            .with_context(|| format!("Could not parse catalog {}", path.display()))?;
        self.merge(parsed);
        Ok(self)
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<CatalogEntry> = self.models.values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    fn merge(&mut self, file: CatalogFile) {
        if let Some(ext) = file.extension {
            self.extension = ext.trim_start_matches('.').to_string();
        }
        for model in file.models {
            self.models.insert(model.name.clone(), model);
        }
    }
}

impl ModelCatalog for StaticCatalog {
    fn resolve(&self, name: &str) -> Option<String> {
        self.models.get(name).map(|entry| entry.url.clone())
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}
