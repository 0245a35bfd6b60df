//! Frontend configuration: backend address and upload policy

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// Top-level viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub upload: UploadConfig,
    /// Color applied to a model when a session starts
    #[serde(default)]
    pub default_color: Rgb,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            upload: UploadConfig::default(),
            default_color: Rgb::default(),
        }
    }
}

/// Where and how files are uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Backend base URL (e.g. "http://localhost:5001"), no trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Deadline for a single upload attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts for network errors and timeouts (at least 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5001".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

impl UploadConfig {
    /// Create config for a backend base URL, keeping default policy
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Create config from a backend address, with or without scheme
    ///
    /// `"192.168.1.10:5001"` becomes `"http://192.168.1.10:5001"`.
    pub fn from_backend_address(addr: &str) -> Self {
        let addr = addr.trim();
        if addr.starts_with("http://") || addr.starts_with("https://") {
            Self::with_base_url(addr)
        } else {
            Self::with_base_url(&format!("http://{}", addr))
        }
    }

    /// Base URL without trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Endpoint that accepts the multipart upload
    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.base())
    }

    /// Endpoint serving an uploaded model by its stored file name
    pub fn model_url(&self, filename: &str) -> String {
        format!("{}/models/{}", self.base(), filename)
    }

    /// Endpoint listing stored models
    pub fn models_index_url(&self) -> String {
        format!("{}/models", self.base())
    }

    /// Attempts actually made (never zero)
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Parse a query parameter from a location search string (`?a=1&b=2`)
pub fn parse_query_param(search: &str, param: &str) -> Option<String> {
    let search = search.trim_start_matches('?');
    for pair in search.split('&') {
        let mut parts = pair.splitn(2, '=');
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if key == param && !value.is_empty() {
                return Some(value.replace("%3A", ":").replace("%2F", "/"));
            }
        }
    }
    None
}
