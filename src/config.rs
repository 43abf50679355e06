//! API connection settings.
//!
//! Each setting is taken from the first source that has it: command-line
//! flag or environment variable (`SCRIBAE_API_URL`, `SCRIBAE_API_TOKEN`),
//! then `config.toml` in the config directory, then the built-in default.

use anyhow::{Context, Result, bail};
use remote::{ClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::paths;

/// Environment variable for the API endpoint
pub const ENV_API_URL: &str = "SCRIBAE_API_URL";

/// Environment variable for the API token
pub const ENV_API_TOKEN: &str = "SCRIBAE_API_TOKEN";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load a config file, or return the empty config if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `config.toml` from the config directory
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }
}

/// Settings given on the command line (or through their environment variables)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Combine overrides, the config file and defaults into a client config.
///
/// A missing or empty token is an error.
pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<ClientConfig> {
    let api_url = overrides
        .api_url
        .or(file.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_token = overrides.api_token.or(file.api_token).unwrap_or_default();
    let timeout_secs = overrides
        .timeout_secs
        .or(file.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    if api_token.trim().is_empty() {
        bail!(
            "No API token configured. Set {ENV_API_TOKEN}, pass --api-token, \
             or add api_token to {}",
            paths::CONFIG_FILE
        );
    }
    if timeout_secs == 0 {
        bail!("Timeout must be at least one second");
    }

    Ok(ClientConfig {
        api_url,
        api_token,
        timeout_secs,
    })
}
