use crate::options::Quality;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted user preferences. Loading and saving are best-effort: a broken
/// config file falls back to defaults with a warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub last_input_folder: Option<PathBuf>,
    pub last_output_folder: Option<PathBuf>,
    pub default_fps: u32,
    pub default_width: u32,
    pub default_quality: Quality,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_input_folder: None,
            last_output_folder: None,
            default_fps: 15,
            default_width: 480,
            default_quality: Quality::High,
        }
    }
}

impl Config {
    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gifforge").join("config.json"))
    }

    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Loads from an explicit location; a missing or broken file falls back
    /// to defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load config, using defaults");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            tracing::warn!("could not save config: no platform config directory");
            return;
        };
        self.save_to(&path);
    }

    pub fn save_to(&self, path: &Path) {
        if let Err(e) = self.try_save(path) {
            tracing::warn!(error = %e, "could not save config");
        }
    }

    fn try_save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
