use std::path::PathBuf;

use anyhow::Result;
use projdeck_core::constants::DEFAULT_DATA_DIR;
use projdeck_core::CoreConfig;

/// Values given on the command line; they win over file and environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub api_url: Option<String>,
}

/// Per-user data directory, falling back to a relative one
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("projdeck"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Layer defaults, the JSON config file, environment variables and flags
pub fn resolve_config(overrides: &CliOverrides) -> Result<CoreConfig> {
    let base = match overrides.config.as_deref() {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig {
            data_dir: default_data_dir(),
            ..CoreConfig::default()
        },
    };

    let mut config = base.with_env_overrides();
    if let Some(dir) = &overrides.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(url) = &overrides.api_url {
        config.api_base_url = url.clone();
    }
    tracing::debug!(?config, "Resolved configuration");
    Ok(config)
}
