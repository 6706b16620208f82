//! Subprocess execution with a hard time limit
//!
//! stdout and stderr are drained on helper threads so a chatty child can never
//! block on a full pipe while we poll for its exit.

use super::ToolError;
use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const PIPE_GRACE: Duration = Duration::from_millis(100);

/// Render a command line for log and error messages
pub fn render(program: &Path, args: &[OsString]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

/// Run `program` with `args`, killing it once `timeout` elapses
///
/// Returns the captured output on a zero exit status.
pub fn run_with_timeout(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
) -> Result<Output, ToolError> {
    let rendered = render(program, args);
    tracing::debug!(command = %rendered, "Running external tool");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::Missing(program.display().to_string())
            } else {
                ToolError::Io(e)
            }
        })?;

    let stdout_rx = drain(child.stdout.take());
    let stderr_rx = drain(child.stderr.take());
    let started_at = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            let stdout = stdout_rx.recv_timeout(PIPE_GRACE).unwrap_or_default();
            let stderr = stderr_rx.recv_timeout(PIPE_GRACE).unwrap_or_default();

            if !status.success() {
                return Err(ToolError::from_command_failure(
                    rendered,
                    status.code().unwrap_or(-1),
                    &String::from_utf8_lossy(&stderr),
                ));
            }
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if started_at.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(
                command = %rendered,
                timeout_ms = timeout.as_millis() as u64,
                "External tool timed out, killed"
            );
            return Err(ToolError::TimedOut {
                command: rendered,
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
    }
    rx
}
