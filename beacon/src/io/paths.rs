//! Canonical on-disk locations.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

const APP_DIR: &str = "beacon";

/// Paths for config, history and logs, derived from the platform directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconPaths {
    pub config_file: PathBuf,
    pub history_file: PathBuf,
    pub log_file: PathBuf,
}

impl BeaconPaths {
    pub fn discover() -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow!("no config directory"))?;
        let data_dir = dirs::data_dir().ok_or_else(|| anyhow!("no data directory"))?;
        let state_dir = dirs::state_dir().unwrap_or_else(|| data_dir.clone());
        Ok(Self::from_roots(&config_dir, &data_dir, &state_dir))
    }

    pub fn from_roots(config_dir: &Path, data_dir: &Path, state_dir: &Path) -> Self {
        Self {
            config_file: config_dir.join(APP_DIR).join("config.toml"),
            history_file: data_dir.join(APP_DIR).join("history.json"),
            log_file: state_dir.join(APP_DIR).join("beacon.log"),
        }
    }

    /// Replace the config file, e.g. from `--config`.
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.config_file = path;
        }
        self
    }

    /// Replace the history file, e.g. from `history_path` in the config.
    pub fn with_history_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.history_file = path;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_defaults() {
        let paths = BeaconPaths::from_roots(Path::new("/c"), Path::new("/d"), Path::new("/s"))
            .with_config_file(Some(PathBuf::from("/tmp/custom.toml")))
            .with_history_file(None);
        assert_eq!(paths.config_file, PathBuf::from("/tmp/custom.toml"));
        assert_eq!(paths.history_file, PathBuf::from("/d/beacon/history.json"));
        assert_eq!(paths.log_file, PathBuf::from("/s/beacon/beacon.log"));
    }
}
