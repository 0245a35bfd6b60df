//! On-disk model storage
//!
//! Uploaded files are written flat into one directory under a sanitized
//! name. Only `.stl` and `.obj` files are stored, listed or served.

use meshview_core::ModelFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No selected file")]
    EmptyName,
    #[error("File type not allowed: {0}")]
    NotAllowed(String),
    #[error("File not found: {0}")]
    NotFound(String),
}

/// Reduce a client-supplied file name to a safe flat name
///
/// Non-ASCII characters are dropped, path separators and whitespace runs
/// become `_`, anything outside `[A-Za-z0-9_.-]` is removed and leading or
/// trailing `.`/`_` are trimmed. `"../../etc/passwd"` becomes `"etc_passwd"`.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Directory of stored models
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
    unique_names: bool,
}

impl ModelStore {
    /// Open (and create if needed) the storage directory
    pub async fn open(root: impl Into<PathBuf>, unique_names: bool) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!(path = %root.display(), unique_names, "Model storage ready");
        Ok(Self { root, unique_names })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name a file will be stored under
    ///
    /// The type is decided by the name as uploaded; stem and extension are
    /// then sanitized separately so names that sanitize to nothing still
    /// keep their extension.
    pub fn stored_name(&self, original: &str) -> Result<String, StoreError> {
        if original.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let (Some(_), Some((stem, ext))) =
            (ModelFormat::from_file_name(original), original.rsplit_once('.'))
        else {
            return Err(StoreError::NotAllowed(original.to_string()));
        };

        let stem = secure_filename(stem);
        let stem = if stem.is_empty() { "model" } else { stem.as_str() };
        if !self.unique_names {
            return Ok(format!("{}.{}", stem, ext));
        }

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Ok(format!("{}-{}.{}", stem, &suffix[..8], ext))
    }

    /// Write an upload and return its stored name
    pub async fn save(&self, original: &str, content: &[u8]) -> Result<String, StoreError> {
        let name = self.stored_name(original)?;
        let path = self.root.join(&name);
        tokio::fs::write(&path, content).await?;
        info!(original, stored = %name, bytes = content.len(), "Model stored");
        Ok(name)
    }

    /// Path of a stored model, if it exists and is a servable type
    pub async fn existing_path(&self, filename: &str) -> Result<PathBuf, StoreError> {
        let safe = secure_filename(filename);
        if safe.is_empty() || ModelFormat::from_file_name(&safe).is_none() {
            return Err(StoreError::NotFound(filename.to_string()));
        }
        let path = self.root.join(&safe);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StoreError::NotFound(filename.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(filename, "Requested model not found");
                Err(StoreError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all stored models, sorted
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if ModelFormat::from_file_name(name).is_some() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
