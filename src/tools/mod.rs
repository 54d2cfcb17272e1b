//! External tool invocation
//!
//! Every analysis step shells out to a third-party program. This module
//! provides the common pieces:
//! 1. Run a program as a subprocess with `std::process::Command`
//! 2. Capture stdout/stderr, optionally bounded by a timeout
//! 3. Map spawn failures to [`ScanError`]
//!
//! Exit status is reported, not judged: `hardening-check` exits non-zero
//! whenever a check fails, which is a finding rather than an error. Callers
//! that need success use [`ToolOutput::ensure_success`].

pub mod hardening_check;
pub mod radare2;

pub use hardening_check::HardeningCheck;
pub use radare2::Radare2;

use crate::error::{ScanError, ScanResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured output of a finished tool
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`None` when killed by a signal)
    pub return_code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.return_code == Some(0)
    }

    /// Turn a non-zero exit into [`ScanError::ToolFailed`]
    pub fn ensure_success(self, tool_name: &str) -> ScanResult<Self> {
        if self.success() {
            return Ok(self);
        }
        let detail = self.stderr.lines().last().unwrap_or("").trim().to_string();
        Err(ScanError::tool_failed(
            tool_name,
            format!("exit code {:?} {}", self.return_code, detail).trim_end(),
        ))
    }
}

/// Map a spawn error to the scan taxonomy
pub(crate) fn spawn_error(tool_name: &str, err: std::io::Error) -> ScanError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ScanError::ToolNotFound {
            tool: tool_name.to_string(),
        }
    } else {
        ScanError::tool_failed(tool_name, format!("failed to run: {}", err))
    }
}

/// Run an external tool and capture its output
///
/// # Arguments
/// * `program` - Executable name or path
/// * `args` - Arguments
/// * `tool_name` - Human-readable tool name for errors and logs
/// * `timeout` - Kill the tool after this long (`None` = wait forever)
/// * `cwd` - Working directory for the tool
pub fn run_tool<S: AsRef<std::ffi::OsStr>>(
    program: &Path,
    args: &[S],
    tool_name: &str,
    timeout: Option<Duration>,
    cwd: Option<&Path>,
) -> ScanResult<ToolOutput> {
    debug!(
        "Running {}: {} {:?}",
        tool_name,
        program.display(),
        args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>()
    );

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child = command.spawn().map_err(|e| spawn_error(tool_name, e))?;

    match timeout {
        Some(limit) => run_with_timeout(child, tool_name, limit),
        None => run_without_timeout(child, tool_name),
    }
}

fn run_without_timeout(child: Child, tool_name: &str) -> ScanResult<ToolOutput> {
    let output = child
        .wait_with_output()
        .map_err(|e| ScanError::tool_failed(tool_name, format!("failed to wait: {}", e)))?;

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        return_code: output.status.code(),
    })
}

/// Drain a pipe on its own thread so a chatty tool never blocks on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// Poll for completion, killing the tool once `timeout` has elapsed
fn run_with_timeout(mut child: Child, tool_name: &str, timeout: Duration) -> ScanResult<ToolOutput> {
    let start = Instant::now();
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(ToolOutput {
                    stdout: stdout.join().unwrap_or_default(),
                    stderr: stderr.join().unwrap_or_default(),
                    return_code: status.code(),
                });
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!("{} timed out after {}s", tool_name, timeout.as_secs());
                    return Err(ScanError::Timeout {
                        tool: tool_name.to_string(),
                        timeout,
                    });
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ScanError::tool_failed(
                    tool_name,
                    format!("failed to wait: {}", e),
                ));
            }
        }
    }
}

/// Resolve a program the way the shell would: explicit paths are checked
/// directly, bare names are searched on `PATH`.
pub fn find_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh() -> &'static Path {
        Path::new("/bin/sh")
    }

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let out = run_tool(sh(), &["-c", "echo hello; echo oops >&2; exit 1"], "sh", None, None)
            .expect("run sh");
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.return_code, Some(1));
        assert!(!out.success());

        let err = out.ensure_success("sh").unwrap_err();
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn test_timeout_kills_tool() {
        let start = Instant::now();
        let err = run_tool(
            sh(),
            &["-c", "exec sleep 10"],
            "sleeper",
            Some(Duration::from_millis(200)),
            None,
        )
        .unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_finishes_within_timeout() {
        let out = run_tool(sh(), &["-c", "echo done"], "sh", Some(Duration::from_secs(10)), None)
            .expect("run sh");
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "done");
    }

    #[test]
    fn test_missing_tool() {
        let err = run_tool(
            Path::new("definitely-not-a-real-tool-4711"),
            &["--version"],
            "imaginary",
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::ToolNotFound { .. }));
    }

    #[test]
    fn test_cwd_is_honored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = run_tool(sh(), &["-c", "pwd"], "sh", None, Some(dir.path())).expect("run sh");
        let reported = PathBuf::from(out.stdout.trim());
        assert_eq!(
            reported.canonicalize().expect("canonical"),
            dir.path().canonicalize().expect("canonical")
        );
    }

    #[test]
    fn test_find_program() {
        assert_eq!(find_program(sh()), Some(PathBuf::from("/bin/sh")));
        assert!(find_program(Path::new("sh")).is_some());
        assert_eq!(find_program(Path::new("/no/such/dir/hardening-check")), None);
    }
}
