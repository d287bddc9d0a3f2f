// Global configuration for tabulated interaction data
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub static CONFIG: Lazy<Mutex<Config>> = Lazy::new(|| Mutex::new(Config::new()));

/// Where interaction modules find their tabulated data.
///
/// Data sets are named by a key such as `"EMPairProduction_CMB"`. A key with
/// an explicit mapping resolves to that path; any other key resolves to
/// `<data_dir>/<key>.txt`. Relative mapped paths are taken relative to
/// `data_dir` when one is set.
///
/// Most code should go through [`Config::global`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_paths: HashMap<String, String>,
    pub data_dir: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data_path(&mut self, key: &str, path: &str) {
        self.data_paths.insert(key.to_string(), path.to_string());
    }

    pub fn set_data_dir(&mut self, dir: &str) {
        self.data_dir = Some(dir.to_string());
    }

    /// Set several mappings at once, or the data directory.
    pub fn set_data_paths<T>(&mut self, input: T)
    where
        T: IntoDataPathsInput,
    {
        input.apply(self);
    }

    pub fn get_data_path(&self, key: &str) -> Option<PathBuf> {
        match (self.data_paths.get(key), &self.data_dir) {
            (Some(path), Some(dir)) => Some(crate::tables::resolve_data_path(Path::new(dir), path)),
            (Some(path), None) => Some(PathBuf::from(path)),
            (None, Some(dir)) => Some(Path::new(dir).join(format!("{}.txt", key))),
            (None, None) => None,
        }
    }

    /// Like [`Config::get_data_path`] but a missing entry is an error.
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        self.get_data_path(key).ok_or_else(|| {
            Error::MissingData(format!(
                "no data path configured for '{}' and no data directory set",
                key
            ))
        })
    }

    pub fn clear(&mut self) {
        self.data_paths.clear();
        self.data_dir = None;
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Input accepted by [`Config::set_data_paths`].
pub trait IntoDataPathsInput {
    fn apply(self, config: &mut Config);
}

impl IntoDataPathsInput for HashMap<String, String> {
    fn apply(self, config: &mut Config) {
        config.data_paths.extend(self);
    }
}

/// A bare string sets the data directory.
impl IntoDataPathsInput for &str {
    fn apply(self, config: &mut Config) {
        config.set_data_dir(self);
    }
}

impl IntoDataPathsInput for String {
    fn apply(self, config: &mut Config) {
        IntoDataPathsInput::apply(self.as_str(), config);
    }
}

impl Config {
    /// Get the global configuration instance
    pub fn global() -> std::sync::MutexGuard<'static, Self> {
        CONFIG
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
