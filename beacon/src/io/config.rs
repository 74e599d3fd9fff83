//! Launcher configuration stored in `config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::action::Params;

/// Launcher configuration (TOML).
///
/// Edited by humans and rewritten by the launcher when preferences are saved.
/// Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BeaconConfig {
    /// Wall-clock limit for captured (non-TTY) extension commands.
    pub command_timeout_secs: u64,

    /// Discard extension stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Overrides the default history file location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,

    pub extensions: BTreeMap<String, ExtensionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtensionConfig {
    /// Directory containing `manifest.json`, or the manifest file itself.
    pub origin: String,

    /// Stored preference values, keyed by preference name.
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub preferences: Params,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 5 * 60,
            output_limit_bytes: 1_000_000,
            history_path: None,
            extensions: BTreeMap::new(),
        }
    }
}

impl BeaconConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (alias, extension) in &self.extensions {
            if extension.origin.trim().is_empty() {
                return Err(anyhow!("extensions.{alias}.origin must be non-empty"));
            }
        }
        Ok(())
    }
}

impl ExtensionConfig {
    /// Origin with `~` expanded; relative origins resolve against `base`.
    pub fn origin_path(&self, base: &Path) -> PathBuf {
        let expanded = expand_home(&self.origin);
        if expanded.is_relative() {
            base.join(expanded)
        } else {
            expanded
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BeaconConfig::default()`.
pub fn load_config(path: &Path) -> Result<BeaconConfig> {
    if !path.exists() {
        let cfg = BeaconConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BeaconConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &BeaconConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    write_atomic(path, &buf)
}

/// Write `contents` next to `path` and rename over it, creating parent directories.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, BeaconConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("config.toml");
        let mut cfg = BeaconConfig::default();
        cfg.extensions.insert(
            "gh".to_string(),
            ExtensionConfig {
                origin: "~/extensions/gh".to_string(),
                preferences: [("token".to_string(), json!("secret"))].into(),
            },
        );
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
        assert!(!temp.path().join("nested").join("config.toml.tmp").exists());
    }

    #[test]
    fn parses_extension_tables() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "command_timeout_secs = 10\n\n[extensions.gh]\norigin = \"gh\"\n\n[extensions.gh.preferences]\nlimit = 5\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.command_timeout_secs, 10);
        assert_eq!(cfg.output_limit_bytes, 1_000_000);
        let gh = &cfg.extensions["gh"];
        assert_eq!(gh.preferences.get("limit"), Some(&json!(5)));
        assert_eq!(gh.origin_path(temp.path()), temp.path().join("gh"));
    }

    #[test]
    fn rejects_zero_timeout_and_empty_origin() {
        let cfg = BeaconConfig {
            command_timeout_secs: 0,
            ..BeaconConfig::default()
        };
        assert!(cfg.validate().is_err());

        let mut cfg = BeaconConfig::default();
        cfg.extensions.insert(
            "gh".to_string(),
            ExtensionConfig {
                origin: " ".to_string(),
                preferences: Params::new(),
            },
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn absolute_origin_is_kept() {
        let ext = ExtensionConfig {
            origin: "/opt/ext".to_string(),
            preferences: Params::new(),
        };
        assert_eq!(ext.origin_path(Path::new("/home/u")), PathBuf::from("/opt/ext"));
    }
}
