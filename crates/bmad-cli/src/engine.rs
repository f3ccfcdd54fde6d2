use bmad_core::collab::ReasoningEngine;
use bmad_core::config::EngineConfig;
use bmad_core::{BmadError, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

/// Stderr kept in an engine failure message.
const MAX_ERROR_OUTPUT: usize = 2 * 1024;

// ---------------------------------------------------------------------------
// ShellEngine
// ---------------------------------------------------------------------------

/// Runs the configured engine command through `sh -c` in the project root,
/// writing the prompt to its stdin and returning its stdout.
pub struct ShellEngine {
    command: String,
    cwd: PathBuf,
    timeout: Option<Duration>,
}

impl ShellEngine {
    pub fn new(command: impl Into<String>, cwd: &Path, timeout: Option<Duration>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.to_path_buf(),
            timeout,
        }
    }

    pub fn from_config(cfg: &EngineConfig, cwd: &Path) -> Self {
        Self::new(
            cfg.command.clone(),
            cwd,
            cfg.timeout_seconds.map(Duration::from_secs),
        )
    }
}

impl ReasoningEngine for ShellEngine {
    fn invoke(&self, prompt: &str) -> Result<String> {
        tracing::debug!(command = %self.command, chars = prompt.len(), "invoking engine");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BmadError::Engine(format!("failed to spawn '{}': {e}", self.command)))?;

        let child_pid = child.id();

        // Writer and readers run on their own threads so no pipe can fill up
        // while another is being drained.
        let stdin = child.stdin.take();
        let payload = prompt.to_string();
        let stdin_thread = std::thread::spawn(move || {
            if let Some(mut w) = stdin {
                let _ = w.write_all(payload.as_bytes());
            }
        });
        let stdout_thread = spawn_reader(child.stdout.take());
        let stderr_thread = spawn_reader(child.stderr.take());

        let status = match self.timeout {
            None => child.wait(),
            Some(limit) => match wait_with_timeout(child, limit) {
                Some(result) => result,
                None => {
                    kill_process(child_pid);
                    return Err(BmadError::Engine(format!(
                        "timed out after {}s",
                        limit.as_secs()
                    )));
                }
            },
        };

        let _ = stdin_thread.join();
        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        let status = status.map_err(|e| BmadError::Engine(format!("wait failed: {e}")))?;
        if !status.success() {
            return Err(BmadError::Engine(failure_message(status, &stderr)));
        }
        Ok(stdout)
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    handle: Option<R>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut r) = handle {
            let _ = r.read_to_string(&mut buf);
        }
        buf
    })
}

/// `None` when the limit passed before the child exited.
fn wait_with_timeout(mut child: Child, limit: Duration) -> Option<std::io::Result<ExitStatus>> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait());
    });
    rx.recv_timeout(limit).ok()
}

fn failure_message(status: ExitStatus, stderr: &str) -> String {
    let code = status
        .code()
        .map(|c| format!("exit status {c}"))
        .unwrap_or_else(|| "terminated by signal".to_string());
    let tail = stderr.trim();
    if tail.is_empty() {
        return code;
    }
    let start = tail
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| tail.len() - i <= MAX_ERROR_OUTPUT)
        .unwrap_or(tail.len());
    format!("{code}: {}", &tail[start..])
}

/// SIGKILL by PID. Errors are ignored.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// ---------------------------------------------------------------------------
// DryRunEngine
// ---------------------------------------------------------------------------

/// Accepts every prompt and does nothing, so only gates decide the outcome.
#[derive(Default)]
pub struct DryRunEngine;

impl ReasoningEngine for DryRunEngine {
    fn invoke(&self, prompt: &str) -> Result<String> {
        tracing::info!(chars = prompt.chars().count(), "dry run: engine not invoked");
        Ok(String::new())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn prompt_reaches_stdin() {
        let dir = TempDir::new().unwrap();
        let engine = ShellEngine::new("tr a-z A-Z", dir.path(), None);
        assert_eq!(engine.invoke("hello").unwrap(), "HELLO");
    }

    #[test]
    fn nonzero_exit_is_an_engine_error() {
        let dir = TempDir::new().unwrap();
        let engine = ShellEngine::new("echo broken >&2; exit 3", dir.path(), None);
        let err = engine.invoke("x").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit status 3"), "{msg}");
        assert!(msg.contains("broken"), "{msg}");
    }

    #[test]
    fn runs_in_project_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let engine = ShellEngine::new("cat marker.txt", dir.path(), None);
        assert_eq!(engine.invoke("").unwrap(), "here");
    }

    #[test]
    fn timeout_kills_slow_engine() {
        let dir = TempDir::new().unwrap();
        let engine = ShellEngine::new("sleep 5", dir.path(), Some(Duration::from_millis(200)));
        let err = engine.invoke("x").unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn dry_run_returns_empty_output() {
        assert_eq!(DryRunEngine.invoke("anything").unwrap(), "");
    }
}
