//! Persistence for the last successfully fetched city.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::config::Config;

/// A single key-value slot holding the last searched city.
pub trait LastCityStore: Send + Sync + Debug {
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, city: &str) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    last_city: Option<String>,
}

/// Stores the slot as `state.toml` on disk.
#[derive(Debug, Clone)]
pub struct FileLastCityStore {
    path: PathBuf,
}

impl FileLastCityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `state.toml` under the platform data directory.
    pub fn default_location() -> Result<Self> {
        let dirs = Config::project_dirs()?;
        Ok(Self::new(dirs.data_dir().join("state.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LastCityStore for FileLastCityStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        let state: StateFile = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        Ok(state.last_city.filter(|c| !c.trim().is_empty()))
    }

    fn save(&self, city: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }

        let state = StateFile { last_city: Some(city.to_string()) };
        let toml = toml::to_string(&state).context("Failed to serialize state to TOML")?;

        fs::write(&self.path, toml)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        Ok(())
    }
}

/// Process-local slot. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryLastCityStore {
    city: Mutex<Option<String>>,
}

impl MemoryLastCityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_city(city: impl Into<String>) -> Self {
        Self { city: Mutex::new(Some(city.into())) }
    }
}

impl LastCityStore for MemoryLastCityStore {
    fn load(&self) -> Result<Option<String>> {
        let guard = self.city.lock().map_err(|_| anyhow::anyhow!("last city slot poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, city: &str) -> Result<()> {
        let mut guard = self.city.lock().map_err(|_| anyhow::anyhow!("last city slot poisoned"))?;
        *guard = Some(city.to_string());
        Ok(())
    }
}
