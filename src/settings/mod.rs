//! Persisted service settings.
//!
//! A single JSON file in the process working directory holds the filename
//! templates. Writes go to a temp file in the same directory followed by a
//! rename, so a concurrent reader always sees a complete file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Name of the settings file, resolved relative to the working directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Templates for one content type, one per mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePair {
    pub video: String,
    pub audio: String,
}

/// The four persisted filename templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTemplates {
    pub single: TemplatePair,
    pub playlist: TemplatePair,
}

impl Default for NamingTemplates {
    fn default() -> Self {
        Self {
            single: TemplatePair {
                video: "<title> - <quality>".to_string(),
                audio: "<title>".to_string(),
            },
            playlist: TemplatePair {
                video: "<index> - <title> - <quality>".to_string(),
                audio: "<index> - <title>".to_string(),
            },
        }
    }
}

/// Store for the settings file.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store backed by `settings.json` inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SETTINGS_FILE),
        }
    }

    /// Store backed by the process working directory.
    pub fn in_working_dir() -> Self {
        Self::new(".")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full settings document, or an empty object when the file
    /// does not exist yet.
    fn read_document(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Map::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {:?}", self.path));
            }
        };

        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", self.path))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("Settings file {:?} is not a JSON object", self.path),
        }
    }

    /// Load the naming templates, falling back to defaults when the file or
    /// the `namingTemplates` key is missing.
    pub fn load_templates(&self) -> Result<NamingTemplates> {
        let document = self.read_document()?;
        match document.get("namingTemplates") {
            Some(value) => serde_json::from_value(value.clone())
                .with_context(|| format!("Invalid namingTemplates in {:?}", self.path)),
            None => {
                debug!("no namingTemplates in {:?}, using defaults", self.path);
                Ok(NamingTemplates::default())
            }
        }
    }

    /// Persist the naming templates.
    ///
    /// Unknown top-level keys in an existing file are preserved. The write
    /// lands in a sibling temp file first and is renamed into place.
    pub fn save_templates(&self, templates: &NamingTemplates) -> Result<()> {
        let mut document = self.read_document().unwrap_or_default();
        document.insert(
            "namingTemplates".to_string(),
            serde_json::to_value(templates)?,
        );

        let serialized = serde_json::to_string_pretty(&Value::Object(document))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move settings into place at {:?}", self.path))?;
        Ok(())
    }
}
