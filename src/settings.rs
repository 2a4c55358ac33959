//! Durable key/value configuration
//!
//! Holds resolved resource addresses and the time of the last discovery run.
//! Values are plain strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{CirculationError, Result};

/// Persistent string settings
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local settings, lost on exit
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    values: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|_| CirculationError::LockPoisoned("settings read"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| CirculationError::LockPoisoned("settings write"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| CirculationError::LockPoisoned("settings write"))?;
        values.remove(key);
        Ok(())
    }
}

/// Settings persisted as a flat TOML table, rewritten on every change
#[derive(Debug)]
pub struct TomlConfigStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl TomlConfigStore {
    /// Open the file at `path`, starting empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|_| CirculationError::LockPoisoned("settings read"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| CirculationError::LockPoisoned("settings write"))?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| CirculationError::LockPoisoned("settings write"))?;
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}
