//! Persistent map of file path -> fold/bookmark record.
//!
//! The whole map is read once when the plugin starts and rewritten once when
//! it shuts down. There is no incremental update and no file locking: the
//! last writer wins.

use crate::atomic_write::{AtomicWriter, WriteOptions, WriteStats};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STORE_FILE_NAME: &str = "remember.json";
pub const SCHEMA_VERSION: u32 = 1;

/// Collapsed folds and bookmarks of one file, as 0-based line indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionRecord {
    #[serde(default)]
    pub folds: Vec<usize>,
    #[serde(default)]
    pub bookmarks: Vec<usize>,
}

impl SessionRecord {
    pub fn is_empty(&self) -> bool {
        self.folds.is_empty() && self.bookmarks.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported session store version {found} in {path} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

/// On-disk layout of the store file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<String>,
    #[serde(default)]
    sessions: BTreeMap<String, SessionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStore {
    sessions: BTreeMap<String, SessionRecord>,
    saved_at: Option<String>,
    // Entries as last read from or written to disk.
    persisted: Option<BTreeMap<String, SessionRecord>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the store at `path`. A missing file is an empty store; anything
    /// unreadable or malformed is an error so recorded sessions are never
    /// silently discarded.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read session store {}", path.display()));
            }
        };

        let doc: StoreDocument = serde_json::from_str(&content)
            .with_context(|| format!("Malformed session store {}", path.display()))?;
        if doc.version != SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: doc.version,
                expected: SCHEMA_VERSION,
            }
            .into());
        }

        Ok(Self {
            persisted: Some(doc.sessions.clone()),
            sessions: doc.sessions,
            saved_at: doc.saved_at,
        })
    }

    /// Rewrites the whole store at `path`. Entries unchanged since the last
    /// load/save keep their `saved_at`, so the file bytes match and the
    /// write is skipped.
    pub fn save(&mut self, path: &Path) -> Result<WriteStats> {
        let unchanged = self.persisted.as_ref() == Some(&self.sessions);
        let saved_at = match &self.saved_at {
            Some(prev) if unchanged => prev.clone(),
            _ => chrono::Utc::now().to_rfc3339(),
        };

        let doc = StoreDocument {
            version: SCHEMA_VERSION,
            saved_at: Some(saved_at),
            sessions: self.sessions.clone(),
        };
        let mut content = serde_json::to_string_pretty(&doc)
            .context("Failed to serialize session store")?;
        content.push('\n');

        let stats = AtomicWriter::new(WriteOptions::default())
            .write_str(path, &content)
            .with_context(|| format!("Failed to save session store {}", path.display()))?;

        self.saved_at = doc.saved_at;
        self.persisted = Some(doc.sessions);
        Ok(stats)
    }

    pub fn get(&self, path: &str) -> Option<&SessionRecord> {
        self.sessions.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.sessions.contains_key(path)
    }

    /// Replaces any previous record for `path`.
    pub fn insert(&mut self, path: impl Into<String>, record: SessionRecord) {
        self.sessions.insert(path.into(), record);
    }

    pub fn remove(&mut self, path: &str) -> Option<SessionRecord> {
        self.sessions.remove(path)
    }

    /// Drops every entry for which `keep` returns false. Returns the removed paths.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&str, &SessionRecord) -> bool,
    {
        let removed: Vec<String> = self
            .sessions
            .iter()
            .filter(|(path, record)| !keep(path, record))
            .map(|(path, _)| path.clone())
            .collect();
        for path in &removed {
            self.sessions.remove(path);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SessionRecord)> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Timestamp of the last write, as read by `load` or produced by `save`.
    pub fn saved_at(&self) -> Option<&str> {
        self.saved_at.as_deref()
    }

    /// JSON view of the entries, used by `remember show --json`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.sessions)?)
    }
}

/// `<config_dir>/plugins/remember.json`
pub fn store_path_in(config_dir: &Path) -> PathBuf {
    config_dir.join("plugins").join(STORE_FILE_NAME)
}
