//! Key-value settings persistence.
//!
//! All state lives in one small map of string and boolean values. Writers go
//! through [`SettingsStore::edit`], which runs a read-modify-write under the
//! store's lock. Two editors in different processes are last-write-wins.

use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    String(String),
}

/// Snapshot of every persisted setting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(BTreeMap<String, PrefValue>);

impl Preferences {
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(PrefValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .insert(key.to_string(), PrefValue::String(value.into()));
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(PrefValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.0.insert(key.to_string(), PrefValue::Bool(value));
    }
}

/// Settings backend shared by the CLI and the inbound SMS handler.
///
/// Both methods block the calling thread until the underlying read or write
/// has finished.
pub trait SettingsStore: Send + Sync {
    fn snapshot(&self) -> Result<Preferences>;

    /// Read-modify-write. Nothing is persisted when `apply` fails.
    fn edit(&self, apply: &mut dyn FnMut(&mut Preferences) -> Result<()>) -> Result<()>;
}

/// In-memory backend, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    prefs: Mutex<Preferences>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferences(prefs: Preferences) -> Self {
        Self {
            prefs: Mutex::new(prefs),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn snapshot(&self) -> Result<Preferences> {
        Ok(lock(&self.prefs).clone())
    }

    fn edit(&self, apply: &mut dyn FnMut(&mut Preferences) -> Result<()>) -> Result<()> {
        let mut guard = lock(&self.prefs);
        let mut next = guard.clone();
        apply(&mut next)?;
        *guard = next;
        Ok(())
    }
}

/// JSON file backend.
///
/// Edits are serialized in-process by a mutex and written via a temp file in
/// the same directory followed by a rename.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    fn read(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let txt = fs::read_to_string(&self.path)?;
        if txt.trim().is_empty() {
            return Ok(Preferences::default());
        }
        serde_json::from_str(&txt).map_err(|e| Error::Settings {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write(&self, prefs: &Preferences) -> Result<()> {
        let txt = serde_json::to_string_pretty(prefs)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn snapshot(&self) -> Result<Preferences> {
        let _guard = lock(&self.write_lock);
        self.read()
    }

    fn edit(&self, apply: &mut dyn FnMut(&mut Preferences) -> Result<()>) -> Result<()> {
        let _guard = lock(&self.write_lock);
        let mut prefs = self.read()?;
        apply(&mut prefs)?;
        self.write(&prefs)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
