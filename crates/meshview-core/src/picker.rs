//! Acceptance of user-picked model files
//!
//! Both the file dialog and drag-and-drop end up here. A file is accepted
//! only when its name ends in `.stl` or `.obj` (any case); anything else is
//! returned as a [`PickRejection`] so the caller can show feedback.

use std::fmt;
use thiserror::Error;

use crate::format::ModelFormat;

/// Why a picked file was not accepted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PickRejection {
    #[error("No file name")]
    EmptyName,
    #[error("Unsupported file type: {name} (expected .stl or .obj)")]
    UnsupportedExtension { name: String },
}

/// A file chosen by the user and accepted for upload
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// File name as reported by the browser (no path)
    pub name: String,
    /// Raw file bytes
    pub content: Vec<u8>,
    /// Format inferred from the extension
    pub format: ModelFormat,
}

impl SelectedFile {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// Content is elided so logging a selection never dumps megabytes of mesh data
impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("bytes", &self.content.len())
            .field("format", &self.format)
            .finish()
    }
}

/// Accept or reject a picked file by name
pub fn accept_file(name: &str, content: Vec<u8>) -> Result<SelectedFile, PickRejection> {
    if name.trim().is_empty() {
        return Err(PickRejection::EmptyName);
    }

    let format = ModelFormat::from_file_name(name).ok_or_else(|| {
        PickRejection::UnsupportedExtension {
            name: name.to_string(),
        }
    })?;

    tracing::debug!(name, bytes = content.len(), %format, "File accepted");

    Ok(SelectedFile {
        name: name.to_string(),
        content,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_supported_extensions_any_case() {
        for name in ["a.stl", "b.STL", "c.Stl", "d.obj", "e.OBJ", "f.oBj"] {
            let file = accept_file(name, vec![1, 2, 3]).unwrap();
            assert_eq!(file.name, name);
            assert_eq!(file.content, vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_rejects_other_extensions() {
        for name in ["model.glb", "model.step", "model", "stl", "notes.txt", "x.stl.bak"] {
            let err = accept_file(name, Vec::new()).unwrap_err();
            assert_eq!(
                err,
                PickRejection::UnsupportedExtension {
                    name: name.to_string()
                }
            );
        }
    }

    #[test]
    fn test_rejects_empty_name() {
        assert_eq!(accept_file("  ", Vec::new()), Err(PickRejection::EmptyName));
    }

    #[test]
    fn test_debug_elides_content() {
        let file = accept_file("big.stl", vec![0u8; 4096]).unwrap();
        let text = format!("{:?}", file);
        assert!(text.contains("bytes: 4096"));
        assert!(!text.contains("0, 0, 0"));
    }
}
