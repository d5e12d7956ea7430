//! Execution of a single render job.
//!
//! [`RenderRunner::run`] materializes the payload as a uniquely named input
//! file, invokes the external renderer on it, enforces the wall-clock deadline
//! and records the job's terminal state. Every fault is converted into an
//! `Error` state on the job; nothing escapes to the caller.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::job::RenderResult;
use crate::services::artifact::{input_base_name, ArtifactLayout};
use crate::services::store::JobStore;

/// Maximum stdout or stderr size kept per stream (10 MiB). The rest is drained and dropped.
const MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

const INPUT_PREFIX: &str = "render_";

#[cfg(unix)]
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runner-side view of the configuration.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Renderer program followed by its leading arguments.
    pub command: Vec<String>,
    pub input_dir: PathBuf,
    pub input_suffix: String,
    pub timeout: Duration,
    pub terminate_grace: Duration,
    pub layout: ArtifactLayout,
}

impl RenderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            command: config.render_command.clone(),
            input_dir: config
                .input_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            input_suffix: config.input_suffix.clone(),
            timeout: config.render_timeout(),
            terminate_grace: Duration::from_secs(config.terminate_grace_secs),
            layout: ArtifactLayout {
                media_root: config.media_dir.clone(),
                public_base_url: config.public_base_url.clone(),
                resolution_profile: config.resolution_profile.clone(),
                entry_symbol: config.entry_symbol.clone(),
                extension: config.artifact_extension.clone(),
            },
        }
    }
}

/// Captured output of a renderer process that exited on its own.
struct ProcessOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

pub struct RenderRunner {
    settings: RenderSettings,
    store: Arc<JobStore>,
}

impl RenderRunner {
    pub fn new(settings: RenderSettings, store: Arc<JobStore>) -> Self {
        Self { settings, store }
    }

    /// Execute a job and record its terminal state. Called exactly once per job.
    pub async fn run(&self, id: Uuid, payload: Bytes, cancel: CancellationToken) {
        let start = Instant::now();
        let outcome = self.execute(id, payload, &cancel).await;
        metrics::histogram!("render_job_duration_seconds").record(start.elapsed().as_secs_f64());

        match outcome {
            Ok(result) => {
                info!(
                    job_id = %id,
                    return_code = result.return_code,
                    duration_ms = start.elapsed().as_millis() as u64,
                    video_url = %result.artifact_url,
                    "Render finished"
                );
                metrics::counter!("render_jobs_succeeded_total").increment(1);
                self.store.complete_success(id, result);
            }
            Err(e) => {
                if matches!(e, RunnerError::Timeout { .. }) {
                    metrics::counter!("render_jobs_timed_out_total").increment(1);
                }
                warn!(job_id = %id, error = %e, "Render failed");
                metrics::counter!("render_jobs_failed_total").increment(1);
                self.store.complete_error(id, e.to_string());
            }
        }
    }

    async fn execute(
        &self,
        id: Uuid,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> Result<RenderResult, RunnerError> {
        // The guard deletes the input when dropped, which covers early returns and unwinding.
        let input = self.materialize(payload).await?;
        let base_name = input_base_name(input.path()).ok_or_else(|| {
            RunnerError::Materialize(io::Error::other("input file has no base name"))
        })?;
        debug!(job_id = %id, input = %input.path().display(), "Payload materialized");

        let outcome = self.render(id, input.path(), cancel).await;

        if let Err(e) = input.close() {
            warn!(job_id = %id, error = %e, "Failed to remove render input");
        }

        let output = outcome?;
        Ok(RenderResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            return_code: output.status.code().unwrap_or(-1),
            artifact_url: self.settings.layout.url(&base_name),
        })
    }

    /// Write the payload to a fresh file in the input directory. Names are
    /// created exclusively, so concurrent jobs never share an input.
    async fn materialize(&self, payload: Bytes) -> Result<NamedTempFile, RunnerError> {
        let dir = self.settings.input_dir.clone();
        let suffix = self.settings.input_suffix.clone();

        tokio::task::spawn_blocking(move || {
            use std::io::Write;

            let mut file = tempfile::Builder::new()
                .prefix(INPUT_PREFIX)
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&payload)?;
            file.flush()?;
            Ok::<_, io::Error>(file)
        })
        .await
        .map_err(|e| RunnerError::Materialize(io::Error::other(e)))?
        .map_err(RunnerError::Materialize)
    }

    async fn render(
        &self,
        id: Uuid,
        input_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, RunnerError> {
        let (program, leading_args) = self
            .settings
            .command
            .split_first()
            .ok_or(RunnerError::EmptyCommand)?;

        let mut std_cmd = std::process::Command::new(program);
        std_cmd
            .args(leading_args)
            .arg(input_path)
            .arg(&self.settings.layout.entry_symbol)
            .arg("--media_dir")
            .arg(&self.settings.layout.media_root);

        // Own process group, so termination also reaches anything the renderer forks.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut std_cmd, 0);

        let mut cmd = Command::from(std_cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;
        // Kept for termination: `child.id()` is gone once the renderer is reaped,
        // but its process group can outlive it.
        let pid = child.id();
        info!(job_id = %id, pid = ?pid, "Renderer spawned");

        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));
        let stdout_abort = stdout_task.abort_handle();
        let stderr_abort = stderr_task.abort_handle();

        let completion = async {
            let status = child.wait().await?;
            let stdout = stdout_task.await.map_err(io::Error::other)??;
            let stderr = stderr_task.await.map_err(io::Error::other)??;
            Ok::<_, io::Error>(ProcessOutput {
                status,
                stdout,
                stderr,
            })
        };

        let interrupted = tokio::select! {
            output = completion => return output.map_err(RunnerError::Wait),
            () = tokio::time::sleep(self.settings.timeout) => RunnerError::Timeout {
                timeout: self.settings.timeout,
            },
            () = cancel.cancelled() => RunnerError::Cancelled,
        };

        warn!(job_id = %id, reason = %interrupted, "Terminating renderer");
        stdout_abort.abort();
        stderr_abort.abort();
        self.terminate(id, pid, &mut child).await;
        Err(interrupted)
    }

    /// Ask the renderer and everything in its process group to stop,
    /// escalate to a kill after the grace period, and reap the renderer.
    ///
    /// The renderer itself may already be reaped while a process it forked
    /// still holds its output open; the group is signalled in that case too.
    async fn terminate(&self, id: Uuid, pid: Option<u32>, child: &mut Child) {
        let reaped = child.id().is_none();

        #[cfg(unix)]
        if let Some(pid) = pid {
            signal_group(pid, libc::SIGTERM);
        }
        #[cfg(not(unix))]
        if !reaped {
            let _ = child.start_kill();
        }

        let stopped = async {
            if !reaped {
                if let Err(e) = child.wait().await {
                    warn!(job_id = %id, pid = ?pid, error = %e, "Failed to wait for renderer");
                }
            }
            #[cfg(unix)]
            if let Some(pid) = pid {
                while group_alive(pid) {
                    tokio::time::sleep(GROUP_POLL_INTERVAL).await;
                }
            };
        };

        if tokio::time::timeout(self.settings.terminate_grace, stopped)
            .await
            .is_ok()
        {
            debug!(job_id = %id, pid = ?pid, "Renderer stopped after SIGTERM");
            return;
        }

        warn!(job_id = %id, pid = ?pid, "Renderer ignored SIGTERM, killing");
        #[cfg(unix)]
        if let Some(pid) = pid {
            signal_group(pid, libc::SIGKILL);
        }
        if child.id().is_some() {
            if let Err(e) = child.kill().await {
                warn!(job_id = %id, pid = ?pid, error = %e, "Failed to kill renderer");
            }
        }
    }
}

/// Signal every process in the group led by `pid`.
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        debug!(pid, signal, error = %io::Error::last_os_error(), "Failed to signal process group");
    }
}

/// Whether any process is left in the group led by `pid`.
#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 only performs the existence and permission check.
    unsafe { libc::kill(-pgid, 0) == 0 }
}

/// Read a stream to its end, keeping at most [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        (&mut h).take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await?;
        tokio::io::copy(&mut h, &mut tokio::io::sink()).await?;
    }
    Ok(buf)
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to materialize render input: {0}")]
    Materialize(#[source] io::Error),

    #[error("Render command is empty")]
    EmptyCommand,

    #[error("Failed to spawn renderer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for renderer: {0}")]
    Wait(#[source] io::Error),

    #[error("Execution timed out after {} seconds", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    #[error("Execution cancelled: service shutting down")]
    Cancelled,
}
