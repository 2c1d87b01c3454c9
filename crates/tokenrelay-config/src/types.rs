//! Configuration types.
//!
//! ```toml
//! [identity]
//! default_scopes = ["openid", "profile", "email"]
//!
//! [exchange]
//! base_url = "https://ownidpfa.azurewebsites.net"
//! timeout_secs = 30
//!
//! [logging]
//! level = "debug"
//! file = false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, Result};

pub use tokenrelay_oauth::DEFAULT_EXCHANGE_URL;

/// Environment variable overriding `exchange.base_url`.
pub const EXCHANGE_URL_ENV: &str = "TOKENRELAY_EXCHANGE_URL";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Identity provider registration.
    pub identity: Option<IdentityConfig>,

    /// Custom token endpoint.
    pub exchange: Option<ExchangeConfig>,

    /// Logging.
    pub logging: Option<LoggingConfig>,
}

impl RelayConfig {
    /// Empty config (every section falls back to its defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Config with every section populated with defaults, for `config init`.
    pub fn with_defaults() -> Self {
        Self {
            identity: Some(IdentityConfig::default()),
            exchange: Some(ExchangeConfig::default()),
            logging: Some(LoggingConfig::default()),
        }
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |p: &Path, source| ConfigError::WriteFile {
            path: p.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| write_err(path, e))
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: RelayConfig) {
        if other.identity.is_some() {
            self.identity = other.identity;
        }

        if other.exchange.is_some() {
            self.exchange = other.exchange;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Effective identity section.
    pub fn identity(&self) -> IdentityConfig {
        self.identity.clone().unwrap_or_default()
    }

    /// Effective exchange section.
    pub fn exchange(&self) -> ExchangeConfig {
        self.exchange.clone().unwrap_or_default()
    }

    /// Effective logging section.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Identity provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Scopes attached to access tokens handed to the bridge.
    pub default_scopes: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Exchange
// ─────────────────────────────────────────────────────────────────────────────

/// Custom token endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Base URL of the token service; `api/token` is appended.
    pub base_url: String,

    /// Per-request timeout. Unset uses the HTTP client's default.
    pub timeout_secs: Option<u64>,

    /// Custom user agent.
    pub user_agent: Option<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EXCHANGE_URL.to_string(),
            timeout_secs: None,
            user_agent: None,
        }
    }
}

impl ExchangeConfig {
    /// Base URL after applying `TOKENRELAY_EXCHANGE_URL`.
    pub fn effective_base_url(&self) -> String {
        self.base_url_with_override(std::env::var(EXCHANGE_URL_ENV).ok())
    }

    fn base_url_with_override(&self, env_value: Option<String>) -> String {
        env_value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.base_url.clone())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Warning for a token service URL that would send tokens in cleartext
/// (plain HTTP to a non-loopback host) or that does not parse.
pub fn endpoint_warning(base_url: &str) -> Option<String> {
    let url = match Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => return Some(format!("token service URL '{}' is invalid: {}", base_url, e)),
    };
    let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    (url.scheme() == "http" && !loopback).then(|| {
        format!(
            "token service URL '{}' is not HTTPS; tokens will travel in cleartext.",
            base_url
        )
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console level for tokenrelay crates (`error`..`trace`).
    pub level: String,

    /// Also write JSON logs to a daily rolling file.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
        }
    }
}
