//! Locating and layering config files.
//!
//! Layers, lowest precedence first:
//! 1. `<config dir>/config.toml`, where the config dir is `$TOKENRELAY_CONFIG_DIR`
//!    or the platform config dir joined with `tokenrelay`
//! 2. `./tokenrelay.toml`
//!
//! Command-line flags and environment overrides are applied by the caller.

use std::path::{Path, PathBuf};

use crate::RelayConfig;

/// Project-local config filename.
pub const PROJECT_CONFIG_FILE: &str = "tokenrelay.toml";

const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "tokenrelay";
const CONFIG_DIR_ENV: &str = "TOKENRELAY_CONFIG_DIR";

/// One file checked during loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub path: PathBuf,
    pub loaded: bool,
}

/// Merged configuration plus what happened while building it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: RelayConfig,
    /// Checked files, lowest precedence first.
    pub layers: Vec<Layer>,
    /// Problems that did not stop loading (unreadable or malformed files).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the layers that were actually merged.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.layers
            .iter()
            .filter(|l| l.loaded)
            .map(|l| l.path.as_path())
            .collect()
    }
}

/// The files a load looks at.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub user: Option<PathBuf>,
    pub project: PathBuf,
}

impl ConfigPaths {
    /// User config from the config dir, project config from the working directory.
    pub fn discover() -> Self {
        Self {
            user: user_config_path(),
            project: PathBuf::from(PROJECT_CONFIG_FILE),
        }
    }

    /// Merge every existing layer. Failures become warnings.
    pub fn load(&self) -> LoadedConfig {
        let mut loaded = LoadedConfig {
            config: RelayConfig::new(),
            layers: Vec::new(),
            warnings: Vec::new(),
        };
        for path in self.user.iter().chain(std::iter::once(&self.project)) {
            let merged = merge_layer(&mut loaded.config, path, &mut loaded.warnings);
            loaded.layers.push(Layer {
                path: path.clone(),
                loaded: merged,
            });
        }
        loaded
    }
}

/// Load the layered configuration from the default locations.
pub fn load_config() -> LoadedConfig {
    ConfigPaths::discover().load()
}

/// `$TOKENRELAY_CONFIG_DIR`, else the platform config dir joined with `tokenrelay`.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

fn merge_layer(config: &mut RelayConfig, path: &Path, warnings: &mut Vec<String>) -> bool {
    if !path.is_file() {
        return false;
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| RelayConfig::from_toml(&text).map_err(|e| e.to_string()));
    match parsed {
        Ok(layer) => {
            config.merge(layer);
            true
        }
        Err(e) => {
            warnings.push(format!("Skipping {}: {}", path.display(), e));
            false
        }
    }
}
