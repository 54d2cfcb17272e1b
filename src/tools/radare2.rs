//! Radare2 complexity analysis
//!
//! Talks to radare2 over its pipe protocol (`radare2 -q0 <file>`): the
//! process prints a NUL once the file is loaded, then answers every command
//! written to stdin with its output followed by a NUL.
//!
//! # Session lifetime
//! - [`R2Session`] owns the child process and kills/reaps it on drop
//! - [`R2Pipe`] owns stdin/stdout and runs on a helper thread
//!
//! The caller waits for the helper with a deadline. On timeout it drops the
//! session, which kills radare2; the helper's next read then fails and the
//! thread exits on its own.

use super::spawn_error;
use crate::error::{ScanError, ScanResult};
use crate::models::{BinaryKind, ComplexityMetrics, ComplexityRecord};
use crossbeam_channel::RecvTimeoutError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const TOOL: &str = "radare2";

/// Function entry from `aflj`
#[derive(Debug, Clone, Deserialize)]
pub struct R2Function {
    #[serde(default)]
    pub name: String,
}

/// Guard for a running radare2 process
pub struct R2Session {
    child: Child,
}

/// Command channel into a running radare2 process
pub struct R2Pipe {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl R2Session {
    pub fn open(program: &Path, binary: &Path) -> ScanResult<(Self, R2Pipe)> {
        let mut command = Command::new(program);
        command
            .arg("-q0")
            .arg("-e")
            .arg("scr.color=0")
            .arg("-e")
            .arg("log.level=0")
            .arg(binary);
        Self::spawn(command)
    }

    fn spawn(mut command: Command) -> ScanResult<(Self, R2Pipe)> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error(TOOL, e))?;

        // Wrap first so the process is reaped even if a pipe is missing
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let session = Self { child };
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => Ok((
                session,
                R2Pipe {
                    stdin,
                    stdout: BufReader::new(stdout),
                },
            )),
            _ => Err(ScanError::tool_failed(TOOL, "stdio pipes unavailable")),
        }
    }
}

impl Drop for R2Session {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl R2Pipe {
    /// Wait for the NUL radare2 prints after loading the file
    pub fn handshake(&mut self) -> ScanResult<()> {
        self.read_reply().map(|_| ())
    }

    pub fn cmd(&mut self, command: &str) -> ScanResult<String> {
        writeln!(self.stdin, "{}", command)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| ScanError::tool_failed(TOOL, format!("session closed: {}", e)))?;
        self.read_reply()
    }

    pub fn cmdj<T: DeserializeOwned>(&mut self, command: &str) -> ScanResult<T> {
        let reply = self.cmd(command)?;
        serde_json::from_str(reply.trim())
            .map_err(|e| ScanError::parse(TOOL, format!("`{}`: {}", command, e)))
    }

    fn read_reply(&mut self) -> ScanResult<String> {
        let mut buf = Vec::new();
        let n = self
            .stdout
            .read_until(b'\0', &mut buf)
            .map_err(|e| ScanError::tool_failed(TOOL, format!("session closed: {}", e)))?;
        if n == 0 || buf.last() != Some(&b'\0') {
            return Err(ScanError::tool_failed(TOOL, "session closed unexpectedly"));
        }
        buf.pop();
        Ok(String::from_utf8_lossy(&buf).to_string())
    }
}

/// Run `work` against the session on a helper thread, bounded by `timeout`.
/// The session is torn down before returning, whatever the outcome.
pub fn run_bounded<T, F>(session: R2Session, pipe: R2Pipe, timeout: Duration, work: F) -> ScanResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut R2Pipe) -> ScanResult<T> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::Builder::new()
        .name("r2-session".to_string())
        .spawn(move || {
            let mut pipe = pipe;
            let result = pipe.handshake().and_then(|_| work(&mut pipe));
            let _ = tx.send(result);
        })?;

    let result = match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ScanError::Timeout {
            tool: TOOL.to_string(),
            timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ScanError::tool_failed(
            TOOL,
            "analysis thread exited without a result",
        )),
    };

    drop(session);
    result
}

/// Complexity collector backed by radare2
pub struct Radare2 {
    program: PathBuf,
}

impl Radare2 {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Measure complexity, folding every failure into the error marker
    pub fn measure(&self, binary: &Path, kind: BinaryKind, timeout: Duration) -> ComplexityRecord {
        match self.try_measure(binary, kind, timeout) {
            Ok(metrics) => ComplexityRecord::measured(metrics),
            Err(e) => {
                warn!("complexity analysis of {} failed: {}", binary.display(), e);
                ComplexityRecord::failed(e)
            }
        }
    }

    pub fn try_measure(
        &self,
        binary: &Path,
        kind: BinaryKind,
        timeout: Duration,
    ) -> ScanResult<ComplexityMetrics> {
        debug!("Starting aa on {} ({})", binary.display(), kind);
        let (session, pipe) = R2Session::open(&self.program, binary)?;
        run_bounded(session, pipe, timeout, move |pipe| collect_complexity(pipe, kind))
    }
}

/// Run the per-kind command sequence on an open session
pub fn collect_complexity(pipe: &mut R2Pipe, kind: BinaryKind) -> ScanResult<ComplexityMetrics> {
    pipe.cmd("aa")?;

    match kind {
        BinaryKind::SharedLibrary => {
            let functions = parse_function_list(&pipe.cmd("aflj")?)?;
            let mut metrics = ComplexityMetrics::default();
            for function in functions.iter().filter(|f| !f.name.is_empty()) {
                let cc = parse_metric(&pipe.cmd(&format!("afCc @ {}", function.name))?);
                let cost = parse_metric(&pipe.cmd(&format!("afC @ {}", function.name))?);
                metrics.cyclomatic_complexity = metrics.cyclomatic_complexity.max(cc);
                metrics.cycle_cost = metrics.cycle_cost.max(cost);
            }
            Ok(metrics)
        }
        BinaryKind::StaticArchive => Ok(ComplexityMetrics {
            cyclomatic_complexity: parse_metric(&pipe.cmd("afCc")?),
            cycle_cost: None,
        }),
        BinaryKind::Executable => {
            let cost = parse_metric(&pipe.cmd("afC @ main")?);
            let cc = parse_metric(&pipe.cmd("afCc @ main")?);
            Ok(ComplexityMetrics {
                cyclomatic_complexity: cc,
                cycle_cost: cost,
            })
        }
    }
}

/// `aflj` prints nothing at all when analysis found no functions
pub fn parse_function_list(output: &str) -> ScanResult<Vec<R2Function>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let json_start = trimmed
        .find('[')
        .ok_or_else(|| ScanError::parse(TOOL, "aflj did not return a JSON array"))?;
    serde_json::from_str(&trimmed[json_start..])
        .map_err(|e| ScanError::parse(TOOL, format!("aflj: {}", e)))
}

/// Integer printed on the last non-empty line, if any
pub fn parse_metric(output: &str) -> Option<i64> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .and_then(|line| line.parse().ok())
}
