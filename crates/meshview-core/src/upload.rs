//! Upload client
//!
//! Sends a picked file to `{base}/upload` as multipart field `file` and turns
//! the backend reply into a model URL (`{base}/models/{filename}`). The HTTP
//! work itself is behind [`UploadTransport`] so the browser build can use
//! `fetch` while tests use a scripted transport.
//!
//! Network failures and timeouts are retried up to
//! [`UploadConfig::attempts`]; HTTP rejections are not.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::UploadConfig;
use crate::picker::SelectedFile;

/// Message shown for every upload failure except timeouts
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload file. Please try again.";

/// Message shown when every attempt ran into the deadline
pub const UPLOAD_TIMEOUT_MESSAGE: &str = "Upload timed out. Please try again.";

/// Multipart form field carrying the file
pub const UPLOAD_FIELD: &str = "file";

/// Failure reported by a transport for a single attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),
}

/// Upload failure after all attempts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Upload rejected with HTTP {status}")]
    Rejected { status: u16, detail: Option<String> },
    #[error("Invalid upload response: {0}")]
    InvalidResponse(String),
    #[error("Network error after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },
    #[error("Upload timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
}

impl UploadError {
    /// Fixed user-facing text; details go to the log only
    pub fn user_message(&self) -> &'static str {
        match self {
            UploadError::Timeout { .. } => UPLOAD_TIMEOUT_MESSAGE,
            _ => UPLOAD_FAILED_MESSAGE,
        }
    }

    fn from_transport(err: TransportError, attempts: u32) -> Self {
        match err {
            TransportError::Network(message) => UploadError::Network { attempts, message },
            TransportError::TimedOut(_) => UploadError::Timeout { attempts },
        }
    }
}

/// One multipart POST, borrowed from the selected file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest<'a> {
    pub url: String,
    /// Form field name
    pub field: &'static str,
    /// File name sent with the part
    pub file_name: &'a str,
    pub content: &'a [u8],
    /// Deadline for this attempt
    pub timeout: Duration,
}

/// Raw HTTP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Successful upload body from the backend
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body from the backend
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Performs a single HTTP attempt
///
/// Implementations enforce `request.timeout` and report it as
/// [`TransportError::TimedOut`].
#[allow(async_fn_in_trait)]
pub trait UploadTransport {
    async fn send(&self, request: &UploadRequest<'_>) -> Result<TransportReply, TransportError>;
}

/// Upload client bound to a backend
pub struct UploadClient<T> {
    config: UploadConfig,
    transport: T,
}

impl<T: UploadTransport> UploadClient<T> {
    pub fn new(config: UploadConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Build the request for a file
    pub fn request_for<'a>(&self, file: &'a SelectedFile) -> UploadRequest<'a> {
        UploadRequest {
            url: self.config.upload_url(),
            field: UPLOAD_FIELD,
            file_name: &file.name,
            content: &file.content,
            timeout: Duration::from_secs(self.config.timeout_secs),
        }
    }

    /// Upload a file and return the URL the model can be fetched from
    pub async fn upload(&self, file: &SelectedFile) -> Result<String, UploadError> {
        let request = self.request_for(file);
        let attempts = self.config.attempts();
        let mut attempt = 0;

        let result = loop {
            attempt += 1;
            match self.transport.send(&request).await {
                Ok(reply) => break interpret_reply(&self.config, &reply),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        file = %file.name,
                        attempt,
                        attempts,
                        error = %e,
                        "Upload attempt failed, retrying"
                    );
                }
                Err(e) => break Err(UploadError::from_transport(e, attempt)),
            }
        };

        match &result {
            Ok(url) => tracing::info!(file = %file.name, url = %url, "Upload complete"),
            Err(e) => tracing::error!(file = %file.name, error = %e, "Upload failed"),
        }

        result
    }
}

/// Turn a backend reply into a model URL
pub fn interpret_reply(config: &UploadConfig, reply: &TransportReply) -> Result<String, UploadError> {
    if !reply.is_success() {
        let detail = serde_json::from_slice::<ErrorResponse>(&reply.body)
            .ok()
            .map(|e| e.error);
        return Err(UploadError::Rejected {
            status: reply.status,
            detail,
        });
    }

    let response: UploadResponse = serde_json::from_slice(&reply.body)
        .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;

    if response.filename.is_empty() {
        return Err(UploadError::InvalidResponse("empty filename".to_string()));
    }

    Ok(config.model_url(&response.filename))
}
