//! Extension registry backed by the configuration file.
//!
//! The registry holds one immutable snapshot of every configured extension.
//! Reloading rebuilds the snapshot wholesale; pages already rendered keep the
//! `Arc<Extension>` they were built from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Result, anyhow};
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::core::action::Params;
use crate::core::error::{BeaconError, BeaconResult};
use crate::io::config::{BeaconConfig, load_config, write_config};
use crate::io::extension::{Extension, load_extension, manifest_file};

static ALIAS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("alias pattern compiles"));

pub fn validate_alias(alias: &str) -> Result<()> {
    if ALIAS_PATTERN.is_match(alias) {
        Ok(())
    } else {
        Err(anyhow!(
            "invalid alias {alias:?}: use lowercase letters, digits, '-' and '_'"
        ))
    }
}

/// Resolves aliases to loaded extensions.
pub trait Registry {
    fn get(&self, alias: &str) -> BeaconResult<Arc<Extension>>;

    /// Every successfully loaded extension, ordered by alias.
    fn extensions(&self) -> Vec<Arc<Extension>>;

    /// Replace the snapshot wholesale. On failure the previous snapshot is kept.
    fn reload(&mut self) -> BeaconResult<()>;
}

/// Stored, per-extension preference values.
pub trait PreferenceStore {
    fn preferences(&self, alias: &str) -> Params;

    /// Merge `values` over the stored preferences and persist them.
    ///
    /// Nothing changes in memory when persisting fails.
    fn save_preferences(&mut self, alias: &str, values: Params) -> BeaconResult<()>;
}

#[derive(Debug)]
pub struct ConfigRegistry {
    config_path: PathBuf,
    config: BeaconConfig,
    extensions: BTreeMap<String, Arc<Extension>>,
    failures: BTreeMap<String, String>,
}

impl ConfigRegistry {
    /// Load the config file and every extension it lists.
    ///
    /// Individual extension failures are recorded, not fatal.
    #[instrument(skip_all, fields(config = %config_path.display()))]
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        let mut registry = Self {
            config_path: config_path.to_path_buf(),
            config,
            extensions: BTreeMap::new(),
            failures: BTreeMap::new(),
        };
        registry.load_all();
        Ok(registry)
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Aliases that failed to load, with the reason.
    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    /// Manifest file configured for `alias`, whether or not it loaded.
    pub fn manifest_path(&self, alias: &str) -> BeaconResult<PathBuf> {
        let entry = self
            .config
            .extensions
            .get(alias)
            .ok_or_else(|| BeaconError::protocol(format!("unknown extension {alias}")))?;
        Ok(manifest_file(&entry.origin_path(&self.base_dir())))
    }

    fn base_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    fn load_all(&mut self) {
        let base = self.base_dir();
        let mut extensions = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for (alias, entry) in &self.config.extensions {
            let loaded = validate_alias(alias)
                .and_then(|()| load_extension(alias, &entry.origin_path(&base)));
            match loaded {
                Ok(extension) => {
                    extensions.insert(alias.clone(), Arc::new(extension));
                }
                Err(err) => {
                    warn!(alias = %alias, err = %format!("{err:#}"), "failed to load extension");
                    failures.insert(alias.clone(), format!("{err:#}"));
                }
            }
        }
        info!(
            loaded = extensions.len(),
            failed = failures.len(),
            "extensions loaded"
        );
        self.extensions = extensions;
        self.failures = failures;
    }
}

impl Registry for ConfigRegistry {
    fn get(&self, alias: &str) -> BeaconResult<Arc<Extension>> {
        if let Some(extension) = self.extensions.get(alias) {
            return Ok(Arc::clone(extension));
        }
        match self.failures.get(alias) {
            Some(reason) => Err(BeaconError::extension(alias, anyhow!("{reason}"))),
            None => Err(BeaconError::protocol(format!("unknown extension {alias}"))),
        }
    }

    fn extensions(&self) -> Vec<Arc<Extension>> {
        self.extensions.values().cloned().collect()
    }

    fn reload(&mut self) -> BeaconResult<()> {
        let config = load_config(&self.config_path).map_err(BeaconError::Persistence)?;
        self.config = config;
        self.load_all();
        Ok(())
    }
}

impl PreferenceStore for ConfigRegistry {
    fn preferences(&self, alias: &str) -> Params {
        self.config
            .extensions
            .get(alias)
            .map(|entry| entry.preferences.clone())
            .unwrap_or_default()
    }

    #[instrument(skip_all, fields(alias))]
    fn save_preferences(&mut self, alias: &str, values: Params) -> BeaconResult<()> {
        let mut updated = self.config.clone();
        let entry = updated
            .extensions
            .get_mut(alias)
            .ok_or_else(|| BeaconError::protocol(format!("unknown extension {alias}")))?;
        entry.preferences.extend(values);
        write_config(&self.config_path, &updated).map_err(BeaconError::Persistence)?;
        self.config = updated;
        Ok(())
    }
}
