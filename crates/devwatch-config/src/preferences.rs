// ── File-backed preferences ──
//
// A flat TOML table of string values in the platform data directory. Reads
// are served from memory; every write rewrites the whole file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::warn;

use devwatch_core::{CoreError, PreferenceStore};

use crate::ConfigError;

#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    entries: DashMap<String, String>,
}

impl FilePreferenceStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let entries = DashMap::new();

        match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(map) => {
                    for (key, value) in map {
                        entries.insert(key, value);
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring corrupt preferences"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), CoreError> {
        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let storage = |e: &dyn std::fmt::Display| CoreError::Storage {
            message: format!("{}: {e}", self.path.display()),
        };
        let raw = toml::to_string(&snapshot).map_err(|e| storage(&e))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| storage(&e))?;
        }
        std::fs::write(&self.path, raw).map_err(|e| storage(&e))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
