//! External-process backend trait and shared error type.
//!
//! The pipeline talks to two external programs: the AV1 encoder (ffmpeg)
//! and the HEIC/HEIF converter (ImageMagick). Both are driven through the
//! [`CommandRunner`] trait so the orchestration logic never touches
//! `std::process` directly. The adapters build an [`Invocation`] describing
//! *what* to run; the runner decides *how*.
//!
//! The production implementation is
//! [`SystemRunner`](super::system_runner::SystemRunner), which spawns the
//! process, captures stderr and enforces a timeout.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Cannot decode {0} input in-process")]
    Undecodable(String),
    #[error("{program} not available: {reason}")]
    ToolUnavailable { program: String, reason: String },
    #[error("{program} exited with {}: {stderr}", exit_label(.status))]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("{program} timed out after {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

impl BackendError {
    /// Whether the error came from running (or failing to run) an external program.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            BackendError::ToolUnavailable { .. }
                | BackendError::CommandFailed { .. }
                | BackendError::TimedOut { .. }
        )
    }
}

/// One external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// The file the program is expected to write.
    pub output: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, output: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: output.to_path_buf(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments as UTF-8 (lossy), for logging and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Shell-like rendering for log lines. Not meant to be re-parsed.
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in self.args_lossy() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<String> {
        let args = self.args_lossy();
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }
}

/// Runs external programs to completion.
///
/// Implementations block the calling thread until the program exits. A
/// non-zero exit is reported as [`BackendError::CommandFailed`] carrying the
/// program's stderr text.
pub trait CommandRunner: Sync {
    fn run(&self, invocation: &Invocation) -> Result<(), BackendError>;
}

/// Best-effort removal of a file an invocation wrote or may have half-written.
///
/// A missing file is fine. Any other failure is logged and ignored.
pub(crate) fn discard_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}
