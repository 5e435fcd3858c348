//! Builder for executing external tool commands with timeout and
//! cancellation support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (raw bytes; images are piped through here).
    pub stdout: Vec<u8>,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// Standard output decoded as lossy UTF-8.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use castit_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> castit_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("quiet")
///     .arg("-print_format").arg("json")
///     .arg("-show_format")
///     .arg("-show_streams")
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout_lossy());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments added so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short program name used in errors and logs.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// The full command line, quoted where an argument contains whitespace.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Spawn the process with stdout piped and stderr discarded, for callers
    /// that stream the output themselves.
    pub fn spawn_piped(&self) -> castit_core::Result<Child> {
        tracing::info!(cmd = %self.command_line(), "Starting process");
        let mut cmd = self.build();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::null());
        cmd.spawn().map_err(|e| {
            castit_core::Error::tool(self.program_name(), format!("failed to spawn: {e}"))
        })
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`castit_core::Error::Tool`] if spawning the process fails.
    /// - [`castit_core::Error::ProcessFailure`] if the process times out or
    ///   exits with a non-zero status (message includes the command line).
    pub async fn execute(&self) -> castit_core::Result<ToolOutput> {
        self.execute_cancellable(&CancellationToken::new()).await
    }

    /// Like [`ToolCommand::execute`] but aborts with
    /// [`castit_core::Error::Cancelled`] as soon as `cancel` fires. The child
    /// is killed when its wait future is dropped.
    pub async fn execute_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> castit_core::Result<ToolOutput> {
        let program_name = self.program_name();
        let command_line = self.command_line();

        if cancel.is_cancelled() {
            return Err(castit_core::Error::Cancelled);
        }

        tracing::info!(cmd = %command_line, "Starting process");

        let mut cmd = self.build();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            castit_core::Error::tool(program_name.clone(), format!("failed to spawn: {e}"))
        })?;

        let result = tokio::select! {
            r = tokio::time::timeout(self.timeout, child.wait_with_output()) => r,
            _ = cancel.cancelled() => {
                tracing::debug!(cmd = %command_line, "Process cancelled");
                return Err(castit_core::Error::Cancelled);
            }
        };

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: output.stdout,
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    tracing::warn!(
                        cmd = %command_line,
                        status = %output.status,
                        "Process exited unsuccessfully"
                    );
                    return Err(castit_core::Error::process(
                        program_name,
                        format!(
                            "exited with status {} running `{}`: {}",
                            output.status,
                            command_line,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(castit_core::Error::process(
                program_name,
                format!("I/O error waiting for `{command_line}`: {e}"),
            )),
            Err(_elapsed) => {
                // The wait future was dropped, so kill_on_drop reaps the child.
                Err(castit_core::Error::process(
                    program_name,
                    format!("`{command_line}` timed out after {:?}", self.timeout),
                ))
            }
        }
    }
}
