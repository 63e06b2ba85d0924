use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;

/// Durable string key-value storage, scoped to one user profile.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;

    /// Write several values as one update.
    fn set_many(&mut self, entries: Vec<(&str, String)>) -> anyhow::Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file. Every write rewrites the file.
#[derive(Debug)]
pub struct JsonFileStore {
    filepath: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `filepath`. A missing file is an empty store; an unreadable one is logged
    /// and replaced on the next write.
    pub fn open(filepath: &Path) -> anyhow::Result<Self> {
        let values = if filepath.exists() {
            let contents = fs::read_to_string(filepath)
                .with_context(|| format!("Reading session file {:?}", filepath))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Session file {:?} is corrupt ({}), starting empty",
                    filepath,
                    err
                );
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            filepath: filepath.to_path_buf(),
            values,
        })
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    fn flush(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.filepath.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.filepath, contents)
            .with_context(|| format!("Writing session file {:?}", self.filepath))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    fn set_many(&mut self, entries: Vec<(&str, String)>) -> anyhow::Result<()> {
        for (key, value) in entries {
            self.values.insert(key.to_string(), value);
        }
        self.flush()
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
