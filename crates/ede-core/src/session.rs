//! Exploration session
//!
//! Owns every piece of mutable pipeline state with an explicit lifetime:
//! the dataset, the synthesis cache, the coverage memo and the artifact
//! registry. Loading a new dataset resets all of them.
//!
//! Every operation is safe to repeat with the same inputs: re-running a
//! suggestion reuses its cached code and upserts onto the same artifact key.

use crate::config::EdeConfig;
use crate::error::{SessionError, SessionResult};
use chrono::NaiveDateTime;
use ede_artifact::{AnnotationKind, ArtifactKey, ArtifactRegistry};
use ede_eventlog::{coverage_summary, process_headline_stats, CoverageFilter, EventLog};
use ede_report::ReportAssembler;
use ede_sandbox::SandboxedExecutor;
use ede_synthesis::{suggest, Oracle, SynthesisCache};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of running one selected suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Artifact captured and upserted
    Registered {
        /// Suggestion that ran
        suggestion: String,
        /// Registry key
        key: ArtifactKey,
        /// True when an earlier run's artifact was replaced in place
        replaced: bool,
        /// Lint warnings for the code that ran
        warnings: Vec<String>,
    },
    /// Synthesis or execution failed; nothing was registered
    Failed {
        /// Suggestion that failed
        suggestion: String,
        /// Failure kind, e.g. `synthesis_failed` or `execution_error`
        kind: String,
        /// Message for the user
        message: String,
        /// Offending code when the code itself was at fault
        code: Option<String>,
    },
}

impl RunOutcome {
    /// Suggestion this outcome belongs to
    #[must_use]
    pub fn suggestion(&self) -> &str {
        match self {
            Self::Registered { suggestion, .. } | Self::Failed { suggestion, .. } => suggestion,
        }
    }

    /// Key of the registered artifact
    #[must_use]
    pub fn key(&self) -> Option<&ArtifactKey> {
        match self {
            Self::Registered { key, .. } => Some(key),
            Self::Failed { .. } => None,
        }
    }

    /// Check if the run failed
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One user's exploration of one dataset
pub struct ExplorationSession {
    config: EdeConfig,
    oracle: Arc<dyn Oracle>,
    cache: SynthesisCache,
    executor: SandboxedExecutor,
    coverage: CoverageFilter,
    assembler: ReportAssembler,
    registry: ArtifactRegistry,
    dataset: Option<EventLog>,
    question: Option<String>,
}

impl ExplorationSession {
    /// Session using a subprocess sandbox built from `config`
    #[must_use]
    pub fn new(config: EdeConfig, oracle: Arc<dyn Oracle>) -> Self {
        let executor = SandboxedExecutor::new(config.sandbox.clone());
        Self::with_executor(config, oracle, executor)
    }

    /// Session with a custom executor
    #[must_use]
    pub fn with_executor(
        config: EdeConfig,
        oracle: Arc<dyn Oracle>,
        executor: SandboxedExecutor,
    ) -> Self {
        let cache = SynthesisCache::new(Arc::clone(&oracle))
            .with_policy(config.staleness)
            .with_timeout(config.synthesis_timeout());
        let assembler = ReportAssembler::new(config.report.clone());
        Self {
            config,
            oracle,
            cache,
            executor,
            coverage: CoverageFilter::default(),
            assembler,
            registry: ArtifactRegistry::new(),
            dataset: None,
            question: None,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EdeConfig {
        &self.config
    }

    /// Loaded dataset
    #[inline]
    #[must_use]
    pub fn dataset(&self) -> Option<&EventLog> {
        self.dataset.as_ref()
    }

    /// Artifacts and annotations collected so far
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Synthesized code cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &SynthesisCache {
        &self.cache
    }

    /// Current analysis question
    #[inline]
    #[must_use]
    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    /// Replace the dataset, dropping all state derived from the previous one.
    ///
    /// The headline statistics are registered immediately.
    pub fn load_dataset(&mut self, log: EventLog) {
        self.registry.clear();
        self.cache.clear();
        self.coverage.clear();

        let stats = process_headline_stats(&log);
        self.registry.upsert(stats);
        info!(
            events = log.len(),
            cases = log.case_count(),
            dataset = %log.fingerprint().short(),
            "dataset loaded"
        );
        self.dataset = Some(log);
    }

    /// Set the analysis question; blank text clears it
    pub fn set_question(&mut self, question: impl Into<String>) {
        let question = question.into();
        self.question = (!question.trim().is_empty()).then(|| question.trim().to_string());
    }

    /// Ask the oracle for analysis ideas for the current question.
    ///
    /// # Errors
    /// [`SessionError::NoQuestion`] without a question, otherwise the
    /// synthesis error from the oracle.
    pub async fn suggest(&self) -> SessionResult<Vec<String>> {
        let question = self.question.as_deref().ok_or(SessionError::NoQuestion)?;
        let suggestions = suggest(
            self.oracle.as_ref(),
            question,
            &self.config.excluded_labels,
            self.config.oracle.timeout(),
        )
        .await?;
        Ok(suggestions)
    }

    /// Run each selected suggestion against the dataset.
    ///
    /// With `coverage`, the dataset is first narrowed to the most frequent
    /// variants and the filter summary is registered. Each suggestion runs
    /// independently; a failure is reported in its outcome and the next one
    /// still runs.
    ///
    /// # Errors
    /// [`SessionError::NoDataset`] without a dataset and
    /// [`SessionError::EventLog`] for an invalid threshold. Nothing is run in
    /// either case.
    pub async fn run_selected(
        &mut self,
        selections: &[String],
        coverage: Option<f64>,
    ) -> SessionResult<Vec<RunOutcome>> {
        let dataset = self.dataset.as_ref().ok_or(SessionError::NoDataset)?;

        let selection = coverage
            .map(|threshold| self.coverage.apply(dataset, threshold))
            .transpose()?;
        let log = match &selection {
            Some(selection) => {
                self.registry.upsert(coverage_summary(selection));
                selection.log().clone()
            }
            None => dataset.clone(),
        };

        let mut outcomes = Vec::with_capacity(selections.len());
        for suggestion in selections {
            let outcome = self.run_one(suggestion, &log).await;
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        info!(
            selected = selections.len(),
            failed,
            registered = self.registry.len(),
            "ran selected suggestions"
        );
        Ok(outcomes)
    }

    async fn run_one(&mut self, suggestion: &str, log: &EventLog) -> RunOutcome {
        let code = match self.cache.get_or_create(suggestion, log.roles()).await {
            Ok(code) => code,
            Err(err) => {
                warn!(suggestion, %err, "synthesis failed");
                return RunOutcome::Failed {
                    suggestion: suggestion.to_string(),
                    kind: "synthesis_failed".to_string(),
                    message: err.to_string(),
                    code: None,
                };
            }
        };

        match self.executor.execute(suggestion, &code, log).await {
            Ok(execution) => {
                let key = execution.artifact.key().clone();
                let outcome = self.registry.upsert(execution.artifact);
                if self
                    .registry
                    .annotation(&key, AnnotationKind::Feedback)
                    .is_none()
                {
                    self.registry
                        .attach_annotation(&key, AnnotationKind::Feedback, "", "");
                }
                RunOutcome::Registered {
                    suggestion: suggestion.to_string(),
                    key,
                    replaced: outcome.is_replacement(),
                    warnings: execution
                        .lint
                        .findings()
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                }
            }
            Err(failure) => RunOutcome::Failed {
                suggestion: suggestion.to_string(),
                kind: failure.error.kind().to_string(),
                message: failure.error.to_string(),
                code: failure.error.is_code_fault().then_some(failure.code),
            },
        }
    }

    /// Bind the user's feedback text to an artifact, replacing earlier text
    pub fn record_feedback(&mut self, key: &ArtifactKey, text: impl Into<String>) {
        self.annotate(key, AnnotationKind::Feedback, text);
    }

    /// Bind text of any kind to an artifact under the kind's default label
    pub fn annotate(&mut self, key: &ArtifactKey, kind: AnnotationKind, text: impl Into<String>) {
        self.registry.attach_annotation(key, kind, "", text);
    }

    /// Build the report document.
    ///
    /// # Errors
    /// [`SessionError::Report`] with [`ede_report::ReportError::EmptyReport`]
    /// when nothing is registered.
    pub fn export_report(&self, generated_at: NaiveDateTime) -> SessionResult<Vec<u8>> {
        let bytes =
            self.assembler
                .build_report(&self.registry, self.question.as_deref(), generated_at)?;
        Ok(bytes)
    }

    /// Build the report and write it to `path`; nothing is written on error.
    ///
    /// # Errors
    /// As [`Self::export_report`], plus IO errors while writing.
    pub async fn export_report_to(
        &self,
        path: impl AsRef<Path>,
        generated_at: NaiveDateTime,
    ) -> SessionResult<usize> {
        let path = path.as_ref();
        let bytes = self.export_report(generated_at)?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| ede_report::ReportError::io_error(path, e))?;
        info!(path = %path.display(), bytes = bytes.len(), "report written");
        Ok(bytes.len())
    }
}

impl fmt::Debug for ExplorationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplorationSession")
            .field("artifacts", &self.registry.len())
            .field("dataset", &self.dataset.as_ref().map(EventLog::len))
            .field("question", &self.question)
            .finish_non_exhaustive()
    }
}
