//! Configuration loading

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory holding the built WASM frontend
    #[serde(default = "default_web_dir")]
    pub web_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            web_dir: default_web_dir(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5001".to_string()
}

fn default_web_dir() -> String {
    "web".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded models are written to
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Largest accepted request body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Append a random suffix to stored names so uploads never overwrite
    #[serde(default = "default_true")]
    pub unique_names: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            unique_names: true,
        }
    }
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5001");
        assert_eq!(config.storage.upload_dir, "uploads");
        assert_eq!(config.storage.max_upload_bytes, 200 * 1024 * 1024);
        assert!(config.storage.unique_names);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meshview.toml");
        std::fs::write(
            &path,
            "[storage]\nupload_dir = \"/srv/models\"\nunique_names = false\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage.upload_dir, "/srv/models");
        assert!(!config.storage.unique_names);
        assert_eq!(config.server.web_dir, "web");
    }
}
