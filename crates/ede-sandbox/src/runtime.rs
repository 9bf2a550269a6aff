//! Script runtimes
//!
//! [`ScriptRuntime`] runs one [`HarnessJob`] and hands back raw process
//! output. [`SubprocessRuntime`] is the production runtime: a fresh
//! interpreter per job, an empty environment and a private temporary working
//! directory that is removed afterwards.

use crate::error::{SandboxError, SandboxResult};
use crate::harness::{HarnessJob, HARNESS_SOURCE};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

const HARNESS_FILE: &str = "harness.py";
const JOB_FILE: &str = "job.json";
const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Raw output of one harness run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOutput {
    /// Standard output, decoded lossily
    pub stdout: String,
    /// Standard error, decoded lossily
    pub stderr: String,
    /// Exit code; `None` when killed by a signal
    pub exit_code: Option<i32>,
}

impl RuntimeOutput {
    /// Check if the process exited with status 0
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last few lines of stderr, for error messages
    #[must_use]
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

/// Runs harness jobs
///
/// Implement this trait to swap the isolation back-end.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    /// Run the job to completion
    async fn run(&self, job: &HarnessJob) -> SandboxResult<RuntimeOutput>;
}

/// Fresh interpreter process per job
#[derive(Debug, Clone)]
pub struct SubprocessRuntime {
    interpreter: PathBuf,
    max_output_bytes: usize,
}

impl SubprocessRuntime {
    /// Create runtime for `interpreter`
    #[must_use]
    pub fn new(interpreter: impl Into<PathBuf>, max_output_bytes: usize) -> Self {
        Self {
            interpreter: interpreter.into(),
            max_output_bytes,
        }
    }

    /// Interpreter path
    #[inline]
    #[must_use]
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    fn command(&self, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        // -I: ignore PYTHON* variables and the user site directory
        cmd.arg("-I")
            .arg(workdir.join(HARNESS_FILE))
            .arg(workdir.join(JOB_FILE))
            .current_dir(workdir)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string()))
            .env("HOME", workdir)
            .env("MPLCONFIGDIR", workdir)
            .env("MPLBACKEND", "Agg")
            .env("OPENBLAS_NUM_THREADS", "1")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ScriptRuntime for SubprocessRuntime {
    async fn run(&self, job: &HarnessJob) -> SandboxResult<RuntimeOutput> {
        let workdir = tempfile::Builder::new().prefix("ede-sandbox-").tempdir()?;
        tokio::fs::write(workdir.path().join(HARNESS_FILE), HARNESS_SOURCE).await?;
        let job_json = serde_json::to_vec(job)
            .map_err(|e| SandboxError::Protocol(format!("cannot encode job: {e}")))?;
        tokio::fs::write(workdir.path().join(JOB_FILE), job_json).await?;

        tracing::debug!(
            interpreter = %self.interpreter.display(),
            workdir = %workdir.path().display(),
            records = job.records.len(),
            "spawning sandbox interpreter"
        );
        let mut child = self
            .command(workdir.path())
            .spawn()
            .map_err(|e| SandboxError::spawn(self.interpreter.clone(), e))?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(SandboxError::Protocol("interpreter streams not captured".to_string()));
        };

        let streams = tokio::try_join!(
            read_capped(stdout, self.max_output_bytes, "stdout"),
            read_capped(stderr, self.max_output_bytes, "stderr"),
        );
        let (stdout, stderr) = match streams {
            Ok(streams) => streams,
            Err(err) => {
                tracing::warn!(%err, "killing sandbox interpreter");
                if let Err(kill) = child.kill().await {
                    tracing::debug!(%kill, "interpreter already gone");
                }
                return Err(err);
            }
        };
        let status = child.wait().await?;

        let result = RuntimeOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.code(),
        };
        tracing::debug!(exit_code = ?result.exit_code, "sandbox interpreter exited");
        Ok(result)
    }
}

/// Read a stream to its end, failing as soon as it exceeds `limit` bytes
async fn read_capped<R>(reader: R, limit: usize, stream: &str) -> SandboxResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(cap).read_to_end(&mut buf).await?;
    if buf.len() > limit {
        return Err(SandboxError::Protocol(format!(
            "interpreter wrote more than {limit} bytes to {stream}"
        )));
    }
    Ok(buf)
}
