// ── Local preferences ──
//
// Key-value storage that survives restarts (selected language, etc.).
// The store is injected into the session controller; devwatch-config
// provides a file-backed implementation.

use dashmap::DashMap;

use crate::error::CoreError;

/// Key of the persisted UI language code.
pub const LANGUAGE_KEY: &str = "language";

/// Persistent key-value storage.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;

    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// Process-local store. Nothing is written anywhere.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    entries: DashMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
