//! Spawns external programs with `std::process`.
//!
//! stdout is discarded, stderr is captured on a helper thread (so a chatty
//! encoder can never fill the pipe and stall), and an optional deadline kills
//! the child if it runs too long.

use super::backend::{BackendError, CommandRunner, Invocation};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Polling interval bounds while waiting on a child with a deadline.
const POLL_MIN: Duration = Duration::from_millis(10);
const POLL_MAX: Duration = Duration::from_millis(200);

/// Runs invocations as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), BackendError> {
        log::debug!("running: {}", invocation.display_line());

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    BackendError::ToolUnavailable {
                        program: invocation.program.clone(),
                        reason: e.to_string(),
                    }
                }
                _ => BackendError::Io(e),
            })?;

        let stderr_pipe = child.stderr.take();
        let stderr_reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                // A read error only loses diagnostics, never the exit status.
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });

        let status = match self.timeout {
            None => Some(child.wait()?),
            Some(limit) => wait_with_deadline(&mut child, limit)?,
        };

        let stderr_bytes = stderr_reader.join().unwrap_or_default();

        match status {
            None => Err(BackendError::TimedOut {
                program: invocation.program.clone(),
                after: self.timeout.unwrap_or_default(),
            }),
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(BackendError::CommandFailed {
                program: invocation.program.clone(),
                status: status.code(),
                stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
            }),
        }
    }
}

/// Wait for `child`, killing it once `limit` has elapsed.
///
/// Returns `Ok(None)` if the deadline passed.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    let mut poll = POLL_MIN;

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        let elapsed = start.elapsed();
        if elapsed >= limit {
            // The child may have exited between try_wait and kill.
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }

        std::thread::sleep(poll.min(limit - elapsed));
        poll = (poll * 2).min(POLL_MAX);
    }
}
