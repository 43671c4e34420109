use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{ACCESS_TOKEN_KEY, CREDENTIALS_FILE};
use crate::error::CoreResult;

/// Persisted client credentials (JSON key/value file in the data directory)
pub struct CredentialStorage {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl CredentialStorage {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let path = data_dir.as_ref().join(CREDENTIALS_FILE);
        let entries = Self::load_from_file(&path).unwrap_or_default();
        Self { path, entries }
    }

    fn load_from_file(path: &Path) -> Option<HashMap<String, String>> {
        let contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    fn save_to_file(&self) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| crate::error::CoreError::storage(e.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.entries.get(ACCESS_TOKEN_KEY).map(String::as_str)
    }

    pub fn store_access_token(&mut self, token: &str) -> CoreResult<()> {
        self.entries
            .insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        self.save_to_file()
    }

    pub fn clear_access_token(&mut self) -> CoreResult<()> {
        if self.entries.remove(ACCESS_TOKEN_KEY).is_some() {
            self.save_to_file()?;
        }
        Ok(())
    }
}
