//! Configuration system for tokenrelay.
//!
//! Provides TOML-based configuration with:
//! - `[identity]` — identity provider default scopes
//! - `[exchange]` — custom token endpoint location and request settings
//! - `[logging]` — console and file log settings
//!
//! Config files are layered: the user config directory first, then a
//! project-local `tokenrelay.toml` on top.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigPaths, Layer, LoadedConfig, PROJECT_CONFIG_FILE, load_config, user_config_dir,
    user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
