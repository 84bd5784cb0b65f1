//! Compression reporting.
//!
//! Every successful pipeline run ends in a [`ProcessedArtifact`]: the file
//! that was written, its size, and how it compares to the original. The
//! caller-facing shape is the smaller [`ProcessResult`], which is what the
//! CLI prints as JSON.
//!
//! [`list_processed`] reports what is already in the output directory.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Percentage size reduction from `original_bytes` to `processed_bytes`,
/// rounded to two decimals.
///
/// Not clamped: an output larger than its source gives a negative value.
/// An empty original has no meaningful ratio and reports `0.0`.
///
/// ```
/// # use imgpress::report::compression_ratio;
/// assert_eq!(compression_ratio(100, 50), 50.0);
/// assert_eq!(compression_ratio(100, 150), -50.0);
/// ```
pub fn compression_ratio(original_bytes: u64, processed_bytes: u64) -> f64 {
    if original_bytes == 0 {
        return 0.0;
    }
    let ratio = (1.0 - processed_bytes as f64 / original_bytes as f64) * 100.0;
    round2(ratio)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A file written by one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedArtifact {
    #[serde(skip)]
    pub path: PathBuf,
    pub output_filename: String,
    pub byte_len: u64,
    pub original_byte_len: u64,
    pub compression_ratio_percent: f64,
}

impl ProcessedArtifact {
    /// Stat a freshly written output and compare it to the original size.
    pub fn from_output(path: &Path, original_byte_len: u64) -> std::io::Result<Self> {
        let byte_len = std::fs::metadata(path)?.len();
        let output_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            output_filename,
            byte_len,
            original_byte_len,
            compression_ratio_percent: compression_ratio(original_byte_len, byte_len),
        })
    }

    pub fn to_result(&self) -> ProcessResult {
        ProcessResult {
            output_filename: self.output_filename.clone(),
            compression_ratio_percent: self.compression_ratio_percent,
        }
    }
}

/// A file found in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedFile {
    pub name: String,
    pub path: String,
    pub byte_len: u64,
}

/// Files in `output_dir`, sorted by name. Subdirectories are skipped and a
/// missing directory lists as empty.
pub fn list_processed(output_dir: &Path) -> std::io::Result<Vec<ListedFile>> {
    if !output_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        files.push(ListedFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path().display().to_string(),
            byte_len: meta.len(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// What a caller gets back from a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub output_filename: String,
    pub compression_ratio_percent: f64,
}
