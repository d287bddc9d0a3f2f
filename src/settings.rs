use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run parameters for [`crate::module::ModuleList::run_source`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of primaries drawn from the source.
    pub candidates: usize,
    pub seed: u64,
    pub parallel: bool,
    /// Propagate secondaries after their parent.
    pub recursive: bool,
    /// Cap on propagated descendants per primary.
    pub max_secondaries_per_candidate: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            candidates: 1000,
            seed: 1,
            parallel: true,
            recursive: true,
            max_secondaries_per_candidate: 100_000,
        }
    }
}

impl Settings {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.candidates == 0 {
            return Err(Error::invalid("settings: candidates must be at least 1"));
        }
        Ok(())
    }
}
