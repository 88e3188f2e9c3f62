use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use ownerpulse_runtime_config::{
    CONFIG_FILE_NAME, CalendarSettings, IdentitySettings, PulseConfig, ScanSettings,
    ServerSettings, apply_compat_fallbacks,
};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("ownerpulse"))
}

/// Get the default config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load config from `path`, or from the default location when `None`.
/// A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PulseConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        return Ok(PulseConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<PulseConfig> {
    let mut config: PulseConfig = toml::from_str(content)?;
    if apply_compat_fallbacks(&mut config) {
        tracing::warn!(
            "Adjusted scan settings to supported values (take={}, max_pages={}, collection={})",
            config.scan.take,
            config.scan.max_pages,
            config.scan.collection
        );
    }
    Ok(config)
}
