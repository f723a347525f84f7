use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::query;

/// Shortcuts every installation starts with.
pub const DEFAULT_SHORTCUTS: &[(&str, &str)] = &[
    ("accounts", "type:account"),
    ("projects", "type:project"),
    ("servers", "type:server"),
    ("sites", "type:site"),
];

#[derive(Debug, Error)]
pub enum ShortcutError {
    #[error("failed to read shortcuts '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse shortcuts '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write shortcuts '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize shortcuts: {source}")]
    Serialize {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown shortcut '{id}'")]
    Unknown { id: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredShortcut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ShortcutFile {
    #[serde(default)]
    shortcuts: BTreeMap<String, StoredShortcut>,
}

/// Saved queries and labels, keyed by shortcut id.
#[derive(Clone, Debug)]
pub struct ShortcutStore {
    path: PathBuf,
    entries: BTreeMap<String, StoredShortcut>,
}

fn default_query(id: &str) -> Option<&'static str> {
    DEFAULT_SHORTCUTS
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, q)| *q)
}

fn clean_id(id: &str) -> String {
    id.trim().to_lowercase()
}

impl ShortcutStore {
    /// Opens the store at `path`; a missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ShortcutError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_yaml::from_str::<ShortcutFile>(&contents)
                    .map_err(|e| ShortcutError::Parse {
                        path: path.display().to_string(),
                        source: e,
                    })?
                    .shortcuts
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(ShortcutError::Read {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        debug!(path = %path.display(), count = entries.len(), "loaded shortcuts");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), ShortcutError> {
        let write_err = |e: std::io::Error| ShortcutError::Write {
            path: self.path.display().to_string(),
            source: e,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let file = ShortcutFile {
            shortcuts: self.entries.clone(),
        };
        let contents =
            serde_yaml::to_string(&file).map_err(|e| ShortcutError::Serialize { source: e })?;
        std::fs::write(&self.path, contents).map_err(write_err)
    }

    /// Stored query, else the built-in default.
    pub fn query(&self, id: &str) -> Option<String> {
        let id = clean_id(id);
        self.entries
            .get(&id)
            .and_then(|s| s.query.clone())
            .or_else(|| default_query(&id).map(str::to_string))
    }

    pub fn label(&self, id: &str) -> String {
        let key = clean_id(id);
        self.entries
            .get(&key)
            .and_then(|s| s.label.clone())
            .unwrap_or(key)
    }

    pub fn set_query(&mut self, id: &str, query: &str) {
        let entry = self.entries.entry(clean_id(id)).or_default();
        entry.query = Some(query.trim().to_string());
    }

    /// Renames a shortcut. Blank labels are ignored; returns whether the
    /// label changed.
    pub fn rename(&mut self, id: &str, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() {
            return false;
        }
        let entry = self.entries.entry(clean_id(id)).or_default();
        entry.label = Some(label.to_string());
        true
    }

    /// Merges `fragment` into the shortcut's query and returns the new query.
    pub fn apply_filter(&mut self, id: &str, fragment: &str) -> Result<String, ShortcutError> {
        let current = self.query(id).ok_or_else(|| ShortcutError::Unknown {
            id: id.trim().to_string(),
        })?;
        let merged = query::merge(&current, fragment);
        self.set_query(id, &merged);
        Ok(merged)
    }

    /// Every known id, defaults included, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = DEFAULT_SHORTCUTS
            .iter()
            .map(|(id, _)| id.to_string())
            .chain(self.entries.keys().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
