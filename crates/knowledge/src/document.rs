//! Raw documents and their format tags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Format tag derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Doc,
    Docx,
}

impl DocumentFormat {
    /// Detect the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" | "text" | "md" | "markdown" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
        }
    }
}

/// A raw document read from the documents directory.
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute or workspace-relative path of the file
    pub path: PathBuf,

    /// Stable identifier recorded on chunks (path relative to the documents dir)
    pub source: String,

    pub format: DocumentFormat,

    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(path: PathBuf, source: String, format: DocumentFormat, bytes: Vec<u8>) -> Self {
        Self {
            path,
            source,
            format,
            bytes,
        }
    }
}
