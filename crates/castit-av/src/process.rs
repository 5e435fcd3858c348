//! Ownership of the live child processes.
//!
//! Two independent slots exist: the device-facing transcode and the
//! preview/subtitle worker. Starting a transcode always supersedes the
//! previous one; preview runs are serialized.

use std::io::Cursor;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use castit_core::{Error, HwAccelDeviceType, Result};
use tokio::io::{AsyncRead, AsyncReadExt, Chain};
use tokio::process::{Child, ChildStdout};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::command::{ToolCommand, ToolOutput};

/// How long the probe window read may take before the process is assumed
/// healthy but slow.
const PROBE_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Grace period to collect an exit status after stdout closed.
const EXIT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// The transcoded byte stream: the bytes consumed while probing followed by
/// the rest of the child's stdout.
pub type TranscodeStream = Chain<Cursor<Vec<u8>>, ChildStdout>;

/// A spawned transcode, shared between the slot and the run that started it.
type SharedChild = Arc<Mutex<Child>>;

/// Which process slot an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSlot {
    Transcode,
    Preview,
}

impl std::fmt::Display for ProcessSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transcode => write!(f, "transcode"),
            Self::Preview => write!(f, "preview"),
        }
    }
}

/// Holds at most one transcode and one preview child process.
#[derive(Default)]
pub struct TranscodeProcessManager {
    transcode: Mutex<Option<SharedChild>>,
    preview_lock: Mutex<()>,
    preview_cancel: parking_lot::Mutex<Option<CancellationToken>>,
}

impl TranscodeProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any running transcode, start `cmd` and return its stdout.
    pub async fn start_transcode(&self, cmd: &ToolCommand) -> Result<TranscodeStream> {
        let (stdout, _) = self.spawn_transcode(cmd).await?;
        Ok(Cursor::new(Vec::new()).chain(stdout))
    }

    /// Start a transcode built for `hw`, probing its first `window_bytes`.
    ///
    /// When a hardware run exits non-zero inside the probe window, the
    /// command is rebuilt with [`HwAccelDeviceType::None`] and started once
    /// more. A failure of that software run is final.
    pub async fn start_transcode_with_fallback<F>(
        &self,
        build: F,
        hw: HwAccelDeviceType,
        window_bytes: usize,
    ) -> Result<TranscodeStream>
    where
        F: Fn(HwAccelDeviceType) -> ToolCommand,
    {
        let cmd = build(hw);
        match self.start_probed(&cmd, window_bytes).await {
            Err(Error::ProcessFailure { message, .. }) if hw.is_hardware() => {
                tracing::warn!(
                    hw = %hw,
                    error = %message,
                    "Hardware transcode failed; retrying in software"
                );
                let software = build(HwAccelDeviceType::None);
                self.start_probed(&software, window_bytes).await
            }
            other => other,
        }
    }

    async fn spawn_transcode(&self, cmd: &ToolCommand) -> Result<(ChildStdout, SharedChild)> {
        let mut slot = self.transcode.lock().await;
        if let Some(previous) = slot.take() {
            tracing::debug!("Superseding running transcode");
            kill_child(&mut *previous.lock().await).await?;
        }

        let mut child = cmd.spawn_piped()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::Internal(format!("stdout not captured for `{}`", cmd.command_line()))
        })?;
        let child = Arc::new(Mutex::new(child));
        *slot = Some(child.clone());
        Ok((stdout, child))
    }

    async fn start_probed(&self, cmd: &ToolCommand, window_bytes: usize) -> Result<TranscodeStream> {
        let (mut stdout, child) = self.spawn_transcode(cmd).await?;
        let mut head = Vec::with_capacity(window_bytes);

        match tokio::time::timeout(PROBE_READ_TIMEOUT, read_window(&mut stdout, &mut head, window_bytes)).await {
            Ok(Ok(true)) => {}
            Err(_) => {
                tracing::debug!(cmd = %cmd.command_line(), "Probe window not filled in time; assuming healthy");
            }
            Ok(Ok(false)) => {
                // Output ended inside the window: the exit status decides.
                if let Some(status) = wait_exit(&child).await {
                    if !status.success() {
                        tracing::error!(cmd = %cmd.command_line(), %status, "Transcode exited early");
                        return Err(Error::process(
                            cmd.program_name(),
                            format!("exited with status {status} running `{}`", cmd.command_line()),
                        ));
                    }
                }
            }
            Ok(Err(e)) => {
                return Err(Error::process(
                    cmd.program_name(),
                    format!("reading output of `{}` failed: {e}", cmd.command_line()),
                ));
            }
        }

        Ok(Cursor::new(head).chain(stdout))
    }

    /// Run a preview or subtitle command to completion. Runs are serialized
    /// so at most one such process is alive.
    pub async fn run_preview(&self, cmd: &ToolCommand, cancel: &CancellationToken) -> Result<ToolOutput> {
        let _guard = self.preview_lock.lock().await;
        let token = cancel.child_token();
        *self.preview_cancel.lock() = Some(token.clone());
        let result = cmd.execute_cancellable(&token).await;
        *self.preview_cancel.lock() = None;
        result
    }

    /// Full-run hardware to software fallback: if the hardware run exits
    /// non-zero, the whole command is rerun in software once.
    pub async fn run_preview_with_fallback<F>(
        &self,
        build: F,
        hw: HwAccelDeviceType,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput>
    where
        F: Fn(HwAccelDeviceType) -> ToolCommand,
    {
        match self.run_preview(&build(hw), cancel).await {
            Err(Error::ProcessFailure { message, .. }) if hw.is_hardware() => {
                tracing::warn!(hw = %hw, error = %message, "Hardware preview failed; retrying in software");
                self.run_preview(&build(HwAccelDeviceType::None), cancel).await
            }
            other => other,
        }
    }

    /// Terminate the process in `slot`, if any.
    ///
    /// Killing an already-exited process is not an error.
    pub async fn kill(&self, slot: ProcessSlot) -> Result<()> {
        match slot {
            ProcessSlot::Transcode => {
                let child = self.transcode.lock().await.take();
                match child {
                    Some(child) => kill_child(&mut *child.lock().await).await,
                    None => Ok(()),
                }
            }
            ProcessSlot::Preview => {
                if let Some(token) = self.preview_cancel.lock().take() {
                    token.cancel();
                }
                Ok(())
            }
        }
    }

    /// Kill both slots, logging failures.
    pub async fn kill_all(&self) {
        for slot in [ProcessSlot::Transcode, ProcessSlot::Preview] {
            if let Err(e) = self.kill(slot).await {
                tracing::warn!(slot = %slot, error = %e, "Failed to kill process");
            }
        }
    }

    /// Whether the transcode slot holds a process that has not exited.
    pub async fn is_transcoding(&self) -> bool {
        let slot = self.transcode.lock().await;
        match slot.as_ref() {
            Some(child) => matches!(child.lock().await.try_wait(), Ok(None)),
            None => false,
        }
    }
}

/// Exit status of `child`, given a short grace period. A superseding spawn
/// never changes which process this reports on.
async fn wait_exit(child: &SharedChild) -> Option<ExitStatus> {
    let mut child = child.lock().await;
    match tokio::time::timeout(EXIT_WAIT_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Failed to collect transcode exit status");
            None
        }
        Err(_) => None,
    }
}

/// Read until `buf` holds `window` bytes (true) or EOF (false).
async fn read_window<R>(reader: &mut R, buf: &mut Vec<u8>, window: usize) -> std::io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    while buf.len() < window {
        let want = (window - buf.len()).min(chunk.len());
        let n = reader.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Ok(false);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(true)
}

async fn kill_child(child: &mut Child) -> Result<()> {
    match child.start_kill() {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
            tracing::debug!("Process already exited");
            return Ok(());
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to kill process");
            return Err(e.into());
        }
    }
    child.wait().await.map(|_| ()).map_err(|e| {
        tracing::warn!(error = %e, "Failed to reap process");
        Error::from(e)
    })
}
