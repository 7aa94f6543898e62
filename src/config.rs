use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_DIR: &str = "notedeck";
pub const CONFIG_FILE: &str = "config.json";
pub const LOG_FILE: &str = "notedeck.log";
pub const ENV_API_BASE: &str = "NOTEDECK_API_BASE";
pub const ENV_BACKEND_URL: &str = "NOTEDECK_BACKEND_URL";
pub const ENV_LOG_FILTER: &str = "NOTEDECK_LOG";
/// Where an unset base URL points; a terminal has no page origin of its own.
pub const SAME_ORIGIN: &str = "http://localhost:3001";

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Base URL as configured, before the same-origin fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    configured: String,
}

impl ApiBase {
    /// What the banner shows; empty means "(same origin)".
    pub fn configured(&self) -> &str {
        &self.configured
    }

    pub fn effective(&self) -> &str {
        if self.configured.is_empty() {
            SAME_ORIGIN
        } else {
            &self.configured
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(base.join(APP_DIR))
}

pub fn default_log_path() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(base.join(APP_DIR).join(LOG_FILE))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_dir()?.join(CONFIG_FILE))
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cfg: Config = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(cfg)
}

/// First non-blank of: command line, environment, config file.
pub fn resolve_api_base(
    cli: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    cfg: &Config,
) -> ApiBase {
    let candidates = [
        cli.map(str::to_string),
        env(ENV_API_BASE),
        env(ENV_BACKEND_URL),
        cfg.api_base.clone(),
    ];
    let configured = candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    ApiBase { configured }
}
