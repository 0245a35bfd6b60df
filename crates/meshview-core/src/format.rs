//! Model file formats and extension detection

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported model file formats
///
/// The format is always derived from the file name extension, never from
/// the file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Stl,
    Obj,
}

impl ModelFormat {
    /// All accepted formats, in display order
    pub const ALL: [ModelFormat; 2] = [ModelFormat::Stl, ModelFormat::Obj];

    /// Detect format from a file name (case-insensitive extension match)
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_tag(ext)
    }

    /// Parse a bare type tag such as `"stl"` or `"OBJ"`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "stl" => Some(ModelFormat::Stl),
            "obj" => Some(ModelFormat::Obj),
            _ => None,
        }
    }

    /// Lowercase extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ModelFormat::Stl => "stl",
            ModelFormat::Obj => "obj",
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            ModelFormat::Stl => "STL",
            ModelFormat::Obj => "OBJ",
        }
    }

    /// Accept string for an HTML file input (e.g. `.stl,.obj`)
    pub fn accept_string() -> String {
        Self::ALL
            .iter()
            .map(|f| format!(".{}", f.extension()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
