//! Process executor
//!
//! Runs external commands directly on the host with a bounded timeout and
//! captures stdout, stderr and the exit status. Every tool that shells out
//! goes through here.
//!
//! On unix each child leads its own process group. When the deadline elapses
//! the whole group is killed, so pipelines and backgrounded grandchildren go
//! down with it. `kill_on_drop` covers the direct child everywhere else.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

/// Default per-command deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit code reported for timeouts and spawn failures.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Shell used for free-form command lines.
const SHELL: &str = "bash";

/// Options for a single command execution.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Working directory (inherits the current one when `None`)
    pub workdir: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Deadline after which the child is killed
    pub timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            workdir: None,
            env: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }
}

/// Captured output of a finished (or killed) command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Whether the deadline elapsed and the child was killed
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            timed_out: false,
        }
    }

    /// Output for a command that never produced a status.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(String::new(), message.into(), FAILURE_EXIT_CODE)
    }

    fn timeout(timeout: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Command timed out after {}s", timeout.as_secs_f64()),
            exit_code: FAILURE_EXIT_CODE,
            timed_out: true,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a free-form command line through `bash -c`.
///
/// # Example
/// ```
/// use ferrule::process::{run_shell, ExecOptions};
///
/// # tokio_test::block_on(async {
/// let output = run_shell("echo hello", &ExecOptions::new()).await;
/// assert!(output.success());
/// assert_eq!(output.stdout.trim(), "hello");
/// # });
/// ```
pub async fn run_shell(command: &str, options: &ExecOptions) -> CommandOutput {
    run_program(SHELL, &["-c".to_string(), command.to_string()], options).await
}

/// Run a program with explicit arguments (no shell interpolation).
pub async fn run_program(program: &str, args: &[String], options: &ExecOptions) -> CommandOutput {
    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(ref workdir) = options.workdir {
        cmd.current_dir(workdir);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(program = program, error = %e, "Failed to spawn command");
            return CommandOutput::failed(format!("Failed to execute {}: {}", program, e));
        }
    };

    let pid = child.id();
    match tokio::time::timeout(options.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            debug!(program = program, exit_code = exit_code, "Command finished");
            CommandOutput::new(
                String::from_utf8_lossy(&output.stdout).to_string(),
                String::from_utf8_lossy(&output.stderr).to_string(),
                exit_code,
            )
        }
        Ok(Err(e)) => CommandOutput::failed(format!("Failed to wait for {}: {}", program, e)),
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid).await;
            }
            warn!(
                program = program,
                timeout_secs = options.timeout.as_secs_f64(),
                "Command timed out, killed"
            );
            CommandOutput::timeout(options.timeout)
        }
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
async fn kill_process_group(pid: u32) {
    let status = Command::new("kill")
        .args(["-s", "KILL", "--", &format!("-{}", pid)])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = status {
        warn!(pid = pid, error = %e, "Failed to kill process group");
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: u32) {}
