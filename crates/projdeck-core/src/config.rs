use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    endpoints, DEFAULT_API_BASE_URL, DEFAULT_DATA_DIR, ENV_API_URL, ENV_DATA_DIR,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    /// Directory holding the persisted credential
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the REST API; also used to build the push channel URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P, api_base_url: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            api_base_url: api_base_url.into(),
        }
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CoreConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Apply `PROJDECK_API_URL` / `PROJDECK_DATA_DIR` on top of this config
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        self
    }

    /// Join an endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }

    pub fn subscribe_url(&self) -> String {
        self.endpoint(endpoints::SUBSCRIBE)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR, DEFAULT_API_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_full() {
        let json = r#"{"dataDir": "/tmp/projdeck", "apiBaseUrl": "https://pm.example.com"}"#;
        let config: CoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/projdeck"));
        assert_eq!(config.api_base_url, "https://pm.example.com");
    }

    #[test]
    fn test_parse_config_minimal() {
        let config: CoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = CoreConfig::new("data", "https://pm.example.com/");
        assert_eq!(
            config.subscribe_url(),
            "https://pm.example.com/api/notifications/subscribe"
        );
        assert_eq!(
            config.endpoint(&endpoints::mark_read(7)),
            "https://pm.example.com/api/notifications/read/7"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projdeck.json");
        std::fs::write(&path, r#"{"apiBaseUrl": "http://10.0.0.2:9000"}"#).unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.api_base_url, "http://10.0.0.2:9000");
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = CoreConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
