//! Input sources: one uploaded file, and discovery of many.
//!
//! A [`SourceImage`] is what the pipeline receives: a path, the format the
//! classifier assigned, and the original size in bytes. The bytes are read
//! on demand; container formats are never read in-process at all.
//!
//! [`discover_inputs`] expands command-line arguments into a list of files.
//! Directories are walked recursively and filtered to accepted extensions;
//! files named explicitly are always kept, so an unsupported file passed by
//! name is reported as such instead of silently skipped.

use crate::imaging::{SourceFormat, classify};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source image not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },
}

/// An input file as handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub byte_len: u64,
}

impl SourceImage {
    /// Stat `path` and classify it. Does not read the contents.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            format: classify(path),
            byte_len: meta.len(),
        })
    }

    /// Read the whole file.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// File name without its final extension; output names derive from it.
    pub fn base_name(&self) -> String {
        base_name_of(&self.path)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// File stem used to name outputs; `image` when the path has none.
pub fn base_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Expand files and directories into the list of inputs to process.
///
/// Order: arguments in the order given; within a directory, entries sorted
/// by file name.
pub fn discover_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, SourceError> {
    let mut inputs = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|e| SourceError::Walk {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                if entry.file_type().is_file()
                    && classify(entry.path()) != SourceFormat::Unsupported
                {
                    inputs.push(entry.into_path());
                }
            }
        } else if path.exists() {
            inputs.push(path.clone());
        } else {
            return Err(SourceError::NotFound(path.clone()));
        }
    }

    Ok(inputs)
}
