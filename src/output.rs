//! CLI output formatting.
//!
//! Every input is shown by its position in the batch and its file name, with
//! what happened to it as indented context lines. The original path is
//! secondary information and appears as a `Source:` line.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! Compressing 3 images
//!     001 dawn.png → dawn.avif
//!         Source: photos/dawn.png
//!         Encoder: avif
//!         Size: 4.77 MB → 1.2 MB (74.84%)
//!     002 broken.png failed
//!         Source: photos/broken.png
//!         Error: Unsupported format: Failed to decode png: ...
//!
//! 2 of 3 succeeded, 1 failed
//! ```
//!
//! ## List
//!
//! ```text
//! Processed (2 files)
//!     001 dawn.avif  1.2 MB
//!     002 dusk.jpg  830.5 KB
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::process::{BatchItem, Mode, ProcessEvent};
use crate::report::{ListedFile, ProcessResult};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable size with 1024-based units and at most two decimals.
///
/// Trailing zeros are dropped: `1536` is `1.5 KB`, `1024` is `1 KB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

fn file_name_of(source_path: &str) -> String {
    std::path::Path::new(source_path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_path.to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

// ============================================================================
// Process output
// ============================================================================

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::BatchStarted { total, mode } => {
            let verb = match mode {
                Mode::Compress => "Compressing",
                Mode::Thumbnail => "Creating thumbnails for",
            };
            vec![format!("{} {}", verb, plural(*total, "image"))]
        }
        ProcessEvent::ImageProcessed {
            index,
            source_path,
            tier,
            artifact,
        } => vec![
            format!(
                "    {} {} \u{2192} {}",
                format_index(*index),
                file_name_of(source_path),
                artifact.output_filename
            ),
            format!("        Source: {}", source_path),
            format!("        Encoder: {}", tier),
            format!(
                "        Size: {} \u{2192} {} ({}%)",
                format_file_size(artifact.original_byte_len),
                format_file_size(artifact.byte_len),
                artifact.compression_ratio_percent
            ),
        ],
        ProcessEvent::ImageFailed {
            index,
            source_path,
            error,
        } => vec![
            format!(
                "    {} {} failed",
                format_index(*index),
                file_name_of(source_path)
            ),
            format!("        Source: {}", source_path),
            format!("        Error: {}", error),
        ],
    }
}

/// One-line summary after a batch.
pub fn format_batch_summary(items: &[BatchItem]) -> Vec<String> {
    let failed = items.iter().filter(|i| i.outcome.is_err()).count();
    let succeeded = items.len() - failed;

    let line = if failed == 0 {
        format!("{} of {} succeeded", succeeded, items.len())
    } else {
        format!("{} of {} succeeded, {} failed", succeeded, items.len(), failed)
    };
    vec![String::new(), line]
}

pub fn print_batch_summary(items: &[BatchItem]) {
    for line in format_batch_summary(items) {
        println!("{}", line);
    }
}

/// JSON view of a batch: one entry per input, in input order.
///
/// Successful entries carry the caller-facing result shape, failed entries
/// carry the terminal error message.
pub fn batch_json(items: &[BatchItem]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = items
        .iter()
        .map(|item| {
            let source = item.source_path.display().to_string();
            match &item.outcome {
                Ok(processed) => {
                    let result: ProcessResult = processed.result();
                    serde_json::json!({
                        "source": source,
                        "outputFilename": result.output_filename,
                        "compressionRatioPercent": result.compression_ratio_percent,
                    })
                }
                Err(e) => serde_json::json!({
                    "source": source,
                    "error": e.to_string(),
                }),
            }
        })
        .collect();
    serde_json::Value::Array(entries)
}

// ============================================================================
// List output
// ============================================================================

/// Format the contents of the output directory.
pub fn format_listing(files: &[ListedFile]) -> Vec<String> {
    let mut lines = vec![format!("Processed ({})", plural(files.len(), "file"))];
    for (i, file) in files.iter().enumerate() {
        lines.push(format!(
            "    {} {}  {}",
            format_index(i + 1),
            file.name,
            format_file_size(file.byte_len)
        ));
    }
    lines
}

pub fn print_listing(files: &[ListedFile]) {
    for line in format_listing(files) {
        println!("{}", line);
    }
}
