//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Environment variables win when the required ones are present
//! 2. Otherwise probe for a config file (TOML or JSON)
//! 3. Otherwise fall back to defaults
//!
//! ## Environment Variables
//! - `HOURMARK_DB_PATH`: Database file path
//! - `HOURMARK_DB_POOL_SIZE`: Connection pool size
//! - `HOURMARK_SYNC_INTERVAL`: Sync interval in seconds
//! - `HOURMARK_SYNC_ENABLED`: Whether sync is enabled (true/false)
//! - `HOURMARK_CLASSIFICATION_FLOOR` / `HOURMARK_CLASSIFICATION_CEILING`
//! - `HOURMARK_ROUNDING_GRANULARITY` / `HOURMARK_ROUNDING_THRESHOLD`
//! - `HOURMARK_PROVIDER_BASE_URL` / `HOURMARK_PROVIDER_TOKEN`
//!
//! ## File Locations
//! `./config.toml`, `./config.json`, `./hourmark.toml`, `./hourmark.json`,
//! then the same names one directory up.

use std::path::{Path, PathBuf};

use hourmark_domain::{Config, HourmarkError, Result};
use tracing::{debug, info};

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `Config` when a located file is malformed. A missing file is not
/// an error; defaults apply.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            debug!(error = ?e, "environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// `HOURMARK_DB_PATH` is required; everything else falls back to the
/// defaults in [`Config`].
///
/// # Errors
/// Returns `Config` if required variables are missing or malformed.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("HOURMARK_DB_PATH")?;
    if let Some(size) = opt_env_parse::<u32>("HOURMARK_DB_POOL_SIZE")? {
        config.database.pool_size = size;
    }

    if let Some(interval) = opt_env_parse::<u64>("HOURMARK_SYNC_INTERVAL")? {
        config.sync.interval_seconds = interval;
    }
    if let Some(enabled) = opt_env_parse::<bool>("HOURMARK_SYNC_ENABLED")? {
        config.sync.enabled = enabled;
    }

    if let Some(floor) = opt_env_parse::<f64>("HOURMARK_CLASSIFICATION_FLOOR")? {
        config.classification.floor = floor;
    }
    if let Some(ceiling) = opt_env_parse::<f64>("HOURMARK_CLASSIFICATION_CEILING")? {
        config.classification.ceiling = ceiling;
    }

    if let Some(granularity) = opt_env_parse::<i64>("HOURMARK_ROUNDING_GRANULARITY")? {
        config.rounding.granularity_minutes = granularity;
    }
    if let Some(threshold) = opt_env_parse::<i64>("HOURMARK_ROUNDING_THRESHOLD")? {
        config.rounding.threshold_minutes = threshold;
    }

    if let Ok(base_url) = std::env::var("HOURMARK_PROVIDER_BASE_URL") {
        config.provider.base_url = base_url;
    }
    config.provider.bearer_token = std::env::var("HOURMARK_PROVIDER_TOKEN").ok();

    Ok(config)
}

/// Load configuration from a file, probing default locations when `path` is
/// `None`. Returns defaults when no file exists.
///
/// # Errors
/// Returns `Config` when the file exists but cannot be parsed.
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let candidate = match path {
        Some(p) => Some(p.to_path_buf()),
        None => probe_config_paths().into_iter().find(|p| p.exists()),
    };

    let Some(file) = candidate else {
        info!("No configuration file found; using defaults");
        return Ok(Config::default());
    };

    let raw = std::fs::read_to_string(&file)
        .map_err(|e| HourmarkError::Config(format!("cannot read {}: {e}", file.display())))?;

    let config = if file.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&raw)
            .map_err(|e| HourmarkError::Config(format!("invalid JSON in {}: {e}", file.display())))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| HourmarkError::Config(format!("invalid TOML in {}: {e}", file.display())))?
    };

    info!(path = %file.display(), "Configuration loaded from file");
    Ok(config)
}

fn probe_config_paths() -> Vec<PathBuf> {
    let names = ["config.toml", "config.json", "hourmark.toml", "hourmark.json"];
    let mut paths = Vec::new();
    for base in [".", ".."] {
        for name in names {
            paths.push(Path::new(base).join(name));
        }
    }
    paths
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| HourmarkError::Config(format!("missing environment variable {name}")))
}

fn opt_env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| HourmarkError::Config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
