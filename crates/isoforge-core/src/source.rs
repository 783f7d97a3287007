//! Source items to place in an image
//!
//! Inputs arrive either as raw paths or as entries that were already resolved
//! by the caller. Resolution turns a path into an absolute [`ImageSource`]
//! once, at ingestion time.

use crate::error::ItemFailure;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Regular file
    File,
    /// Directory, added with its base name
    Directory,
}

/// Resolved filesystem entry to add to the image tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    path: PathBuf,
    kind: SourceKind,
}

impl ImageSource {
    /// Resolve a path to an existing file or directory
    pub fn resolve(path: &Path) -> Result<Self, ItemFailure> {
        let failure = |reason: String| ItemFailure::SourceResolution {
            input: path.display().to_string(),
            reason,
        };

        let absolute = std::fs::canonicalize(path).map_err(|e| failure(e.to_string()))?;
        let metadata = std::fs::metadata(&absolute).map_err(|e| failure(e.to_string()))?;

        let kind = if metadata.is_dir() {
            SourceKind::Directory
        } else if metadata.is_file() {
            SourceKind::File
        } else {
            return Err(failure("not a regular file or directory".to_string()));
        };

        Ok(Self {
            path: absolute,
            kind,
        })
    }

    /// Absolute path of the entry
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of the entry
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Name the entry takes at the root of the image
    pub fn image_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Check if this entry is a directory
    pub fn is_dir(&self) -> bool {
        self.kind == SourceKind::Directory
    }
}

/// One element of the source sequence handed to assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// A path still to be resolved
    Path(PathBuf),
    /// An entry the caller already resolved
    Resolved(ImageSource),
}

impl SourceInput {
    /// Resolve into an [`ImageSource`], or explain why it cannot be
    pub fn resolve(self) -> Result<ImageSource, ItemFailure> {
        match self {
            SourceInput::Path(path) => ImageSource::resolve(&path),
            SourceInput::Resolved(source) => Ok(source),
        }
    }
}

impl From<PathBuf> for SourceInput {
    fn from(path: PathBuf) -> Self {
        SourceInput::Path(path)
    }
}

impl From<&Path> for SourceInput {
    fn from(path: &Path) -> Self {
        SourceInput::Path(path.to_path_buf())
    }
}

impl From<&str> for SourceInput {
    fn from(path: &str) -> Self {
        SourceInput::Path(PathBuf::from(path))
    }
}

impl From<String> for SourceInput {
    fn from(path: String) -> Self {
        SourceInput::Path(PathBuf::from(path))
    }
}

impl From<ImageSource> for SourceInput {
    fn from(source: ImageSource) -> Self {
        SourceInput::Resolved(source)
    }
}
