//! Request-unique tokens for temporary file names.
//!
//! Output files are named after the input's base name, and so are the
//! intermediate JPEGs the AV1 encoder reads. Two runs on inputs that share a
//! base name would otherwise write the same intermediate path. Each run
//! mixes a token into its temporary names instead.
//!
//! The token is a SHA-256 over the input path, the process id, a
//! per-process counter and the wall clock, truncated to 16 hex characters.
//! The counter alone makes tokens unique within a process; the other inputs
//! separate concurrent processes sharing an output directory.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const TOKEN_LEN: usize = 16;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh token for one pipeline run on `input`.
pub fn request_token(input: &Path) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(b"imgpress-request\0");
    hasher.update(input.to_string_lossy().as_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(nanos.to_le_bytes());

    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(TOKEN_LEN);
    hex
}

/// `<base>-<token>-temp.jpg`
pub fn temp_name(base: &str, token: &str) -> String {
    format!("{}-{}-temp.jpg", base, token)
}

/// `<base>-<token>-thumbnail-temp.jpg`
pub fn thumbnail_temp_name(base: &str, token: &str) -> String {
    format!("{}-{}-thumbnail-temp.jpg", base, token)
}
