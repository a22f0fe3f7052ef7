//! Subprocess execution with a hard timeout and an output cap.
//!
//! stdout and stderr are drained on background threads while the main
//! thread polls `try_wait`, so a chatty child can never block on a full
//! pipe. Once stdout exceeds the cap the child is killed and the output
//! collected so far is returned marked as truncated.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const READ_CHUNK: usize = 1024 * 1024;

/// Result from running an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Whether the command ran to completion (or was cut at the output cap)
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub return_code: Option<i32>,
    pub timed_out: bool,
    /// stdout hit the byte cap and the process was killed
    pub truncated: bool,
    pub error: Option<String>,
}

impl CommandOutput {
    fn completed(stdout: String, stderr: String, return_code: Option<i32>, truncated: bool) -> Self {
        Self {
            success: true,
            stdout,
            stderr,
            return_code,
            truncated,
            ..Default::default()
        }
    }

    fn failure(error: String) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    fn timeout(program: &str, timeout: Duration) -> Self {
        Self {
            timed_out: true,
            error: Some(format!("{} timed out after {:?}", program, timeout)),
            ..Default::default()
        }
    }

    /// Completed with exit status zero, or was cut short at the output cap.
    pub fn exited_cleanly(&self) -> bool {
        self.success && (self.return_code == Some(0) || self.truncated)
    }

    /// One-line reason for logs when the command did not exit cleanly.
    pub fn failure_reason(&self) -> String {
        if let Some(e) = &self.error {
            return e.clone();
        }
        let stderr = self.stderr.trim();
        match self.return_code {
            Some(code) if stderr.is_empty() => format!("exit code {}", code),
            Some(code) => format!("exit code {}: {}", code, stderr),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `program args...` in `cwd`, killing it after `timeout`.
///
/// Never returns an error: spawn failures, timeouts and wait failures are
/// reported through [`CommandOutput`].
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
    max_output_bytes: usize,
) -> CommandOutput {
    debug!("Running {} {:?}", program, args);

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                return CommandOutput::failure(format!("{} not found", program));
            }
            return CommandOutput::failure(format!("Failed to run {}: {}", program, e));
        }
    };

    let overflow = Arc::new(AtomicBool::new(false));
    let stdout_reader = child
        .stdout
        .take()
        .map(|pipe| spawn_capped_reader(pipe, max_output_bytes, Arc::clone(&overflow)));
    let stderr_reader = child
        .stderr
        .take()
        .map(|pipe| spawn_capped_reader(pipe, READ_CHUNK, Arc::new(AtomicBool::new(false))));

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if overflow.load(Ordering::Relaxed) {
                    warn!(
                        "{} output exceeded {}MB limit, truncating",
                        program,
                        max_output_bytes / (1024 * 1024)
                    );
                    kill_and_reap(&mut child);
                    break None;
                }
                if start.elapsed() > timeout {
                    kill_and_reap(&mut child);
                    join_reader(stdout_reader);
                    join_reader(stderr_reader);
                    warn!("{} timed out after {:?}", program, timeout);
                    return CommandOutput::timeout(program, timeout);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_and_reap(&mut child);
                return CommandOutput::failure(format!("Failed to wait for {}: {}", program, e));
            }
        }
    };

    let stdout = join_reader(stdout_reader);
    let stderr = join_reader(stderr_reader);
    let truncated = overflow.load(Ordering::Relaxed);
    CommandOutput::completed(
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
        status.and_then(|s| s.code()),
        truncated,
    )
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Read `pipe` to EOF, keeping at most `cap` bytes. Bytes beyond the cap are
/// drained and dropped, and `overflow` is raised.
fn spawn_capped_reader<R>(mut pipe: R, cap: usize, overflow: Arc<AtomicBool>) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK.min(cap.max(1))];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = cap.saturating_sub(kept.len());
                    if n > room {
                        kept.extend_from_slice(&buf[..room]);
                        overflow.store(true, Ordering::Relaxed);
                    } else {
                        kept.extend_from_slice(&buf[..n]);
                    }
                }
            }
        }
        kept
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program() {
        let out = run_with_timeout(
            "definitely-not-a-real-binary-xyz",
            &[],
            None,
            Duration::from_secs(1),
            1024,
        );
        assert!(!out.success);
        assert!(!out.exited_cleanly());
        assert!(out.failure_reason().contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout() {
        let out = run_with_timeout("sh", &["-c", "echo hello"], None, Duration::from_secs(5), 1024);
        assert!(out.exited_cleanly());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let out = run_with_timeout("sleep", &["10"], None, Duration::from_millis(200), 1024);
        assert!(out.timed_out);
        assert!(!out.success);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_cap_truncates() {
        let out = run_with_timeout(
            "sh",
            &["-c", "yes line | head -c 100000"],
            None,
            Duration::from_secs(5),
            1000,
        );
        assert!(out.success);
        assert!(out.truncated);
        assert_eq!(out.stdout.len(), 1000);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_reported() {
        let out = run_with_timeout("sh", &["-c", "echo oops >&2; exit 3"], None, Duration::from_secs(5), 1024);
        assert!(out.success);
        assert!(!out.exited_cleanly());
        assert_eq!(out.return_code, Some(3));
        assert_eq!(out.failure_reason(), "exit code 3: oops");
    }
}
