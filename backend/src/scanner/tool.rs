//! Thin wrapper around the NAPS2 console binary.
//!
//! Every invocation is bounded by a timeout. Both output pipes are drained on
//! helper threads while the child runs so a chatty tool can never block on a
//! full pipe, and the child is killed once the bound elapses.
//!
//! The tool may leave worker processes behind that inherited its pipes. Once
//! the direct child has exited, output is collected for at most
//! [`OUTPUT_GRACE`] longer; whatever arrived by then is the result and the
//! reader threads are abandoned. A run therefore never takes longer than its
//! timeout plus that grace.

use crate::error::ToolError;
use log::warn;
use std::ffi::OsStr;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long output is still collected after the direct child exited.
const OUTPUT_GRACE: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 8 * 1024;

/// Exit status plus stdout and stderr of one run, stdout first.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub combined: String,
}

#[derive(Debug, Clone)]
pub struct ScanTool {
    path: PathBuf,
}

impl ScanTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `--listdevices --driver <driver>`
    pub fn list_devices(&self, driver: &str, timeout: Duration) -> Result<ToolOutput, ToolError> {
        self.run(["--listdevices", "--driver", driver], timeout)
    }

    /// Scans with `profile` into `output_template`, where the tool expands
    /// `$(nnnn)` to a zero padded page counter.
    pub fn scan(
        &self,
        output_template: &Path,
        profile: &str,
        timeout: Duration,
    ) -> Result<ToolOutput, ToolError> {
        let args: [&OsStr; 5] = [
            OsStr::new("-o"),
            output_template.as_os_str(),
            OsStr::new("-p"),
            OsStr::new(profile),
            OsStr::new("--force"),
        ];
        self.run(args, timeout)
    }

    pub fn run<I, S>(&self, args: I, timeout: Duration) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                path: self.path.clone(),
                source,
            })?;

        let started = Instant::now();
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_timeout(&mut child, started, timeout)?;

        let deadline = Instant::now() + OUTPUT_GRACE;
        let mut combined = collect(&stdout, deadline);
        combined.push_str(&collect(&stderr, deadline));
        Ok(ToolOutput { status, combined })
    }
}

/// Forwards everything read from `pipe` in chunks. The channel disconnects
/// once the pipe reaches end of file, or immediately when there is no pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });
    }
    rx
}

fn collect(rx: &Receiver<Vec<u8>>, deadline: Instant) -> String {
    let mut bytes = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Scan tool output still open after exit, another process holds it");
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn wait_with_timeout(
    child: &mut Child,
    started: Instant,
    timeout: Duration,
) -> Result<ExitStatus, ToolError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Writes an executable `sh` script standing in for the scan tool.
    pub fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("naps2-fake.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::test_support::fake_tool;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn collects_stdout_and_stderr() {
        let dir = tempdir().unwrap();
        let tool = ScanTool::new(fake_tool(dir.path(), "echo out; echo err >&2; exit 3"));

        let output = tool.run(["x"], Duration::from_secs(10)).unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert!(output.combined.contains("out"));
        assert!(output.combined.contains("err"));
    }

    #[test]
    fn passes_arguments_through() {
        let dir = tempdir().unwrap();
        let tool = ScanTool::new(fake_tool(dir.path(), "echo \"$@\""));

        let output = tool.list_devices("twain", Duration::from_secs(10)).unwrap();

        assert!(output.status.success());
        assert_eq!(output.combined.trim(), "--listdevices --driver twain");
    }

    #[test]
    fn kills_a_hung_tool() {
        let dir = tempdir().unwrap();
        let tool = ScanTool::new(fake_tool(dir.path(), "exec sleep 30"));

        let started = Instant::now();
        let err = tool.run(["x"], Duration::from_millis(300)).unwrap_err();

        assert!(matches!(err, ToolError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn background_worker_holding_output_does_not_stall_the_run() {
        let dir = tempdir().unwrap();
        let tool = ScanTool::new(fake_tool(dir.path(), "sleep 5 & echo started"));

        let started = Instant::now();
        let output = tool.run(["x"], Duration::from_secs(30)).unwrap();

        assert!(output.status.success());
        assert!(output.combined.contains("started"));
        assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let tool = ScanTool::new("/nonexistent/naps2.console");
        let err = tool.run(["x"], Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
