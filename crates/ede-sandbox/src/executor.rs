//! Sandboxed executor
//!
//! Runs synthesized code against a private copy of the event log and turns
//! the result into a registry-ready [`Artifact`].
//!
//! # Steps
//! 1. Static lint; a missing entry point fails fast as a contract violation.
//! 2. The runtime compiles and runs the code in an empty namespace.
//! 3. The harness envelope maps onto [`SandboxError`] kinds.
//! 4. Metadata is read leniently and the artifact key is derived:
//!    `meta.key`, else a slug of `meta.title`, else a slug of the suggestion.
//!
//! Every failure carries the offending code ([`ExecutionFailure`]) and leaves
//! all session state untouched.

use crate::config::SandboxConfig;
use crate::error::{ExecutionFailure, SandboxError, SandboxResult};
use crate::harness::{Envelope, EnvelopeStatus, HarnessJob};
use crate::runtime::{RuntimeOutput, ScriptRuntime, SubprocessRuntime};
use ede_artifact::{Artifact, ArtifactKey, ArtifactMetadata};
use ede_eventlog::EventLog;
use ede_synthesis::{lint_synthesized_code, LintReport, SynthesizedCode, ENTRY_POINT};
use std::fmt;
use std::sync::Arc;

/// Metadata `origin` recorded on artifacts produced here
pub const ORIGIN: &str = "interactive_exploration";

/// A successful run
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Captured artifact, keyed and titled
    pub artifact: Artifact,
    /// Lint warnings for the code that ran
    pub lint: LintReport,
}

/// Executes synthesized code through a [`ScriptRuntime`]
#[derive(Clone)]
pub struct SandboxedExecutor {
    runtime: Arc<dyn ScriptRuntime>,
    config: SandboxConfig,
}

impl SandboxedExecutor {
    /// Executor with a subprocess runtime built from `config`
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        let runtime = Arc::new(SubprocessRuntime::new(
            config.interpreter.clone(),
            config.max_output_bytes,
        ));
        Self { runtime, config }
    }

    /// Executor with a custom runtime
    #[must_use]
    pub fn with_runtime(config: SandboxConfig, runtime: Arc<dyn ScriptRuntime>) -> Self {
        Self { runtime, config }
    }

    /// Active limits
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `code` for `suggestion` against `log`.
    ///
    /// # Errors
    /// Returns an [`ExecutionFailure`] holding the code and the cause.
    pub async fn execute(
        &self,
        suggestion: &str,
        code: &SynthesizedCode,
        log: &EventLog,
    ) -> Result<Execution, ExecutionFailure> {
        self.run(suggestion, code, log).await.map_err(|error| {
            tracing::warn!(suggestion, kind = error.kind(), %error, "execution failed");
            ExecutionFailure::new(suggestion, code.source(), error)
        })
    }

    async fn run(
        &self,
        suggestion: &str,
        code: &SynthesizedCode,
        log: &EventLog,
    ) -> SandboxResult<Execution> {
        let lint = lint_synthesized_code(code.source());
        if lint.has_errors() {
            return Err(SandboxError::ContractViolation(lint.error_summary()));
        }
        for finding in lint.findings() {
            tracing::warn!(suggestion, rule = ?finding.rule, %finding, "lint warning");
        }

        let job = HarnessJob {
            code: code.source().to_string(),
            entry_point: ENTRY_POINT.to_string(),
            allowed_modules: self.config.allowed_modules.clone(),
            memory_limit_bytes: self.config.memory_limit_bytes(),
            timestamp_column: Some(log.roles().timestamp.clone()),
            records: log.to_records(),
        };

        let timeout = self.config.timeout();
        let output = tokio::time::timeout(timeout, self.runtime.run(&job))
            .await
            .map_err(|_| SandboxError::Timeout(timeout))??;

        let envelope = read_envelope(&output)?;
        let artifact = build_artifact(suggestion, code, envelope)?;
        tracing::info!(suggestion, key = %artifact.key(), kind = artifact.kind().as_str(), "execution succeeded");
        Ok(Execution { artifact, lint })
    }
}

impl fmt::Debug for SandboxedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxedExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn read_envelope(output: &RuntimeOutput) -> SandboxResult<Envelope> {
    match Envelope::from_stdout(&output.stdout) {
        Some(parsed) => {
            parsed.map_err(|e| SandboxError::Protocol(format!("malformed envelope: {e}")))
        }
        None if !output.success() => Err(SandboxError::ExecutionError(format!(
            "interpreter exited with {:?}: {}",
            output.exit_code,
            output.stderr_tail(5)
        ))),
        None => Err(SandboxError::Protocol(
            "interpreter exited without a result".to_string(),
        )),
    }
}

fn build_artifact(
    suggestion: &str,
    code: &SynthesizedCode,
    envelope: Envelope,
) -> SandboxResult<Artifact> {
    match envelope.status {
        EnvelopeStatus::Ok => {}
        EnvelopeStatus::CompileError => return Err(SandboxError::CompileError(envelope.message)),
        EnvelopeStatus::ContractViolation => {
            return Err(SandboxError::ContractViolation(envelope.message))
        }
        EnvelopeStatus::ExecutionError => {
            return Err(SandboxError::ExecutionError(envelope.message))
        }
    }

    let captured = envelope
        .artifact
        .ok_or_else(|| SandboxError::Protocol("ok envelope without artifact".to_string()))?;
    let omitted = captured.omitted_rows();
    let payload = captured.into_payload().map_err(SandboxError::Protocol)?;

    let mut metadata = ArtifactMetadata::from_value_lenient(envelope.metadata);
    if omitted > 0 {
        tracing::warn!(suggestion, omitted, "captured table was truncated");
        metadata.truncated_rows = Some(omitted);
    }
    let title = metadata
        .title
        .clone()
        .unwrap_or_else(|| suggestion.trim().to_string());
    let key = match &metadata.key {
        Some(key) => ArtifactKey::new(key.clone()),
        None => ArtifactKey::from_text(&title),
    };
    metadata.set_default("suggestion_text", suggestion);
    metadata.set_default("origin", ORIGIN);
    metadata.set_default("code_hash", code.hash().to_string());

    Ok(Artifact::new(key, title, payload).with_metadata(metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::CapturedArtifact;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use ede_artifact::{ArtifactKind, ArtifactPayload};
    use ede_eventlog::{ColumnRoles, Event};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;

    const CODE: &str = "def build_plot(df):\n    return fig, meta\n";

    /// Replies with a fixed output and remembers the jobs it saw
    struct CannedRuntime {
        output: RuntimeOutput,
        jobs: Mutex<Vec<HarnessJob>>,
    }

    impl CannedRuntime {
        fn envelope(envelope: &Envelope) -> Arc<Self> {
            Self::raw(RuntimeOutput {
                stdout: format!("print noise\n{}", envelope.to_line()),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }

        fn raw(output: RuntimeOutput) -> Arc<Self> {
            Arc::new(Self {
                output,
                jobs: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ScriptRuntime for CannedRuntime {
        async fn run(&self, job: &HarnessJob) -> SandboxResult<RuntimeOutput> {
            self.jobs.lock().unwrap().push(job.clone());
            Ok(self.output.clone())
        }
    }

    struct HangingRuntime;

    #[async_trait]
    impl ScriptRuntime for HangingRuntime {
        async fn run(&self, _job: &HarnessJob) -> SandboxResult<RuntimeOutput> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(RuntimeOutput::default())
        }
    }

    fn log() -> EventLog {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        EventLog::new(
            ColumnRoles::xes(),
            vec![Event::new("c1", "A", t), Event::new("c2", "B", t)],
        )
        .unwrap()
    }

    fn code() -> SynthesizedCode {
        SynthesizedCode::new("Bar chart of X", CODE, ColumnRoles::xes())
    }

    fn pairs() -> CapturedArtifact {
        CapturedArtifact::Pairs {
            rows: vec![("A".to_string(), "1".to_string())],
            omitted_rows: 0,
        }
    }

    fn executor(runtime: Arc<dyn ScriptRuntime>) -> SandboxedExecutor {
        SandboxedExecutor::with_runtime(SandboxConfig::default(), runtime)
    }

    #[tokio::test]
    async fn success_derives_key_from_title() {
        let runtime = CannedRuntime::envelope(&Envelope::ok(
            pairs(),
            json!({"title": "Cases per Activity!", "type": "bar_chart", "x_axis": "activity"}),
        ));
        let out = executor(runtime.clone())
            .execute("Bar chart of X", &code(), &log())
            .await
            .unwrap();

        let artifact = out.artifact;
        assert_eq!(artifact.key().as_str(), "ix_cases-per-activity");
        assert_eq!(artifact.title(), "Cases per Activity!");
        assert_eq!(artifact.kind(), ArtifactKind::KeyValueTable);
        assert_eq!(artifact.metadata().x_axis.as_deref(), Some("activity"));
        assert_eq!(
            artifact.metadata().extra("suggestion_text"),
            Some(&Value::from("Bar chart of X"))
        );
        assert_eq!(artifact.metadata().extra("origin"), Some(&Value::from(ORIGIN)));

        let jobs = runtime.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].records, log().to_records());
        assert_eq!(jobs[0].entry_point, "build_plot");
        assert_eq!(jobs[0].timestamp_column.as_deref(), Some("time:timestamp"));
    }

    #[tokio::test]
    async fn explicit_meta_key_wins() {
        let runtime = CannedRuntime::envelope(&Envelope::ok(
            pairs(),
            json!({"title": "T", "key": "custom_key"}),
        ));
        let out = executor(runtime)
            .execute("Bar chart of X", &code(), &log())
            .await
            .unwrap();
        assert_eq!(out.artifact.key().as_str(), "custom_key");
    }

    #[tokio::test]
    async fn non_mapping_metadata_falls_back_to_suggestion() {
        let runtime = CannedRuntime::envelope(&Envelope::ok(pairs(), json!(["not", "a", "dict"])));
        let out = executor(runtime)
            .execute("Histogram of Y", &code(), &log())
            .await
            .unwrap();
        assert_eq!(out.artifact.key().as_str(), "ix_histogram-of-y");
        assert_eq!(out.artifact.title(), "Histogram of Y");
    }

    #[tokio::test]
    async fn same_suggestion_yields_same_key() {
        let runtime = CannedRuntime::envelope(&Envelope::ok(pairs(), Value::Null));
        let exec = executor(runtime);
        let first = exec.execute("Bar chart of X", &code(), &log()).await.unwrap();
        let second = exec.execute("Bar chart of X", &code(), &log()).await.unwrap();
        assert_eq!(first.artifact.key(), second.artifact.key());
    }

    #[tokio::test]
    async fn truncated_capture_is_recorded_in_metadata() {
        let rows = CapturedArtifact::Rows {
            columns: vec!["activity".to_string()],
            rows: vec![vec!["A".to_string()]],
            omitted_rows: 120,
        };
        let runtime = CannedRuntime::envelope(&Envelope::ok(rows, json!({"title": "Top rows"})));
        let out = executor(runtime).execute("s", &code(), &log()).await.unwrap();
        assert_eq!(out.artifact.metadata().truncated_rows, Some(120));

        let runtime = CannedRuntime::envelope(&Envelope::ok(pairs(), json!({"title": "T"})));
        let out = executor(runtime).execute("s", &code(), &log()).await.unwrap();
        assert_eq!(out.artifact.metadata().truncated_rows, None);
    }

    #[tokio::test]
    async fn figure_payload_is_png() {
        let runtime = CannedRuntime::envelope(&Envelope::ok(
            CapturedArtifact::Figure {
                png_base64: "iVBORw==".to_string(),
            },
            json!({"title": "T"}),
        ));
        let out = executor(runtime).execute("s", &code(), &log()).await.unwrap();
        assert!(matches!(out.artifact.payload(), ArtifactPayload::Image { bytes, .. } if bytes.len() == 4));
    }

    #[tokio::test]
    async fn missing_entry_point_fails_before_running() {
        let runtime = CannedRuntime::envelope(&Envelope::ok(pairs(), Value::Null));
        let code = SynthesizedCode::new("s", "def plot(df):\n    pass\n", ColumnRoles::xes());
        let failure = executor(runtime.clone())
            .execute("s", &code, &log())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SandboxError::ContractViolation(_)));
        assert_eq!(failure.code, "def plot(df):\n    pass\n");
        assert!(runtime.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn envelope_statuses_map_to_errors() {
        let cases = [
            (EnvelopeStatus::CompileError, "compile_error"),
            (EnvelopeStatus::ContractViolation, "contract_violation"),
            (EnvelopeStatus::ExecutionError, "execution_error"),
        ];
        for (status, kind) in cases {
            let runtime = CannedRuntime::envelope(&Envelope::failed(status, "boom"));
            let failure = executor(runtime).execute("s", &code(), &log()).await.unwrap_err();
            assert_eq!(failure.error.kind(), kind);
            assert_eq!(failure.code, CODE);
            assert_eq!(failure.suggestion, "s");
        }
    }

    #[tokio::test]
    async fn crash_without_envelope_is_execution_error() {
        let runtime = CannedRuntime::raw(RuntimeOutput {
            stdout: String::new(),
            stderr: "Traceback\nMemoryError\n".to_string(),
            exit_code: Some(1),
        });
        let failure = executor(runtime).execute("s", &code(), &log()).await.unwrap_err();
        let SandboxError::ExecutionError(message) = failure.error else {
            panic!("expected execution error");
        };
        assert!(message.contains("MemoryError"));
    }

    #[tokio::test]
    async fn clean_exit_without_envelope_is_protocol_error() {
        let runtime = CannedRuntime::raw(RuntimeOutput {
            exit_code: Some(0),
            ..RuntimeOutput::default()
        });
        let failure = executor(runtime).execute("s", &code(), &log()).await.unwrap_err();
        assert!(matches!(failure.error, SandboxError::Protocol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_code_times_out() {
        let config = SandboxConfig::default().with_timeout(Duration::from_secs(2));
        let exec = SandboxedExecutor::with_runtime(config, Arc::new(HangingRuntime));
        let failure = exec.execute("s", &code(), &log()).await.unwrap_err();
        assert!(matches!(failure.error, SandboxError::Timeout(d) if d == Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn lint_warnings_are_reported_not_fatal() {
        let runtime = CannedRuntime::envelope(&Envelope::ok(pairs(), Value::Null));
        let code = SynthesizedCode::new(
            "s",
            "import os\ndef build_plot(df):\n    return fig, meta\n",
            ColumnRoles::xes(),
        );
        let out = executor(runtime).execute("s", &code, &log()).await.unwrap();
        assert!(!out.lint.is_clean());
    }
}
