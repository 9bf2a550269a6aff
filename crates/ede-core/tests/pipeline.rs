//! End-to-end session tests with a scripted oracle and a canned runtime.

use chrono::{NaiveDate, NaiveDateTime};
use ede_artifact::{AnnotationKind, ArtifactKey, ArtifactKind};
use ede_core::{EdeConfig, ExplorationSession, RunOutcome, SessionError};
use ede_eventlog::{ColumnRoles, COVERAGE_SUMMARY_KEY, PROCESS_STATS_KEY};
use ede_report::{ReportError, NO_COMMENT};
use ede_sandbox::{SandboxConfig, SandboxedExecutor};
use ede_synthesis::StalenessPolicy;
use ede_test_utils::{
    abcd_log, CannedRuntime, ScriptedOracle, NO_ENTRY_POINT_CODE, RAISING_CODE,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const BAR: &str = "Bar chart of X";
const HIST: &str = "Histogram of Y";

struct Harness {
    session: ExplorationSession,
    oracle: Arc<ScriptedOracle>,
    runtime: Arc<CannedRuntime>,
}

fn harness_with(oracle: ScriptedOracle, config: EdeConfig) -> Harness {
    let oracle = Arc::new(oracle);
    let runtime = Arc::new(CannedRuntime::new());
    let executor = SandboxedExecutor::with_runtime(SandboxConfig::default(), runtime.clone());
    let mut session = ExplorationSession::with_executor(config, oracle.clone(), executor);
    session.load_dataset(abcd_log());
    Harness {
        session,
        oracle,
        runtime,
    }
}

fn harness(oracle: ScriptedOracle) -> Harness {
    harness_with(oracle, EdeConfig::default())
}

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn selections(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn synthesized_keys(session: &ExplorationSession) -> Vec<String> {
    session
        .registry()
        .iter()
        .filter(|a| a.kind() == ArtifactKind::Image)
        .map(|a| a.key().as_str().to_string())
        .collect()
}

#[tokio::test]
async fn two_suggestions_register_in_request_order_and_rerun_updates_in_place() {
    let mut h = harness(ScriptedOracle::new());

    let outcomes = h
        .session
        .run_selected(&selections(&[BAR, HIST]), None)
        .await
        .unwrap();
    assert!(outcomes.iter().all(|o| !o.is_failure()));
    let keys = synthesized_keys(&h.session);
    assert_eq!(keys.len(), 2);
    assert_eq!(
        keys,
        vec![
            ArtifactKey::from_text(BAR).as_str().to_string(),
            ArtifactKey::from_text(HIST).as_str().to_string(),
        ]
    );
    let total = h.session.registry().len();

    let rerun = h
        .session
        .run_selected(&selections(&[BAR]), None)
        .await
        .unwrap();
    assert!(matches!(
        &rerun[0],
        RunOutcome::Registered { replaced: true, .. }
    ));
    assert_eq!(synthesized_keys(&h.session), keys);
    assert_eq!(h.session.registry().len(), total);
    assert_eq!(h.oracle.synthesis_calls(), 2, "rerun must hit the cache");
    assert_eq!(h.runtime.runs(), 3);
}

#[tokio::test]
async fn headline_stats_are_registered_on_load() {
    let h = harness(ScriptedOracle::new());
    let first = h.session.registry().iter().next().unwrap();
    assert_eq!(first.key().as_str(), PROCESS_STATS_KEY);
}

#[tokio::test]
async fn coverage_narrows_the_records_handed_to_the_code() {
    let mut h = harness(ScriptedOracle::new());
    let full_events = h.session.dataset().unwrap().len();

    h.session
        .run_selected(&selections(&[BAR]), Some(0.8))
        .await
        .unwrap();

    // A (3 events × 60 cases) + B (2 events × 25 cases)
    assert_eq!(h.runtime.record_counts(), vec![60 * 3 + 25 * 2]);
    assert!(full_events > 60 * 3 + 25 * 2);
    assert!(h
        .session
        .registry()
        .contains(&ArtifactKey::new(COVERAGE_SUMMARY_KEY)));
}

#[tokio::test]
async fn invalid_threshold_runs_nothing() {
    let mut h = harness(ScriptedOracle::new());
    let before = h.session.registry().len();

    let err = h
        .session
        .run_selected(&selections(&[BAR]), Some(0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::EventLog(_)));
    assert!(err.is_recoverable());
    assert_eq!(h.runtime.runs(), 0);
    assert_eq!(h.oracle.synthesis_calls(), 0);
    assert_eq!(h.session.registry().len(), before);
}

#[tokio::test]
async fn contract_violation_and_execution_error_leave_registry_unchanged() {
    let oracle = ScriptedOracle::new()
        .with_code("No entry", NO_ENTRY_POINT_CODE)
        .with_code("Raises", RAISING_CODE);
    let mut h = harness(oracle);
    let before = h.session.registry().len();

    let outcomes = h
        .session
        .run_selected(&selections(&["No entry", "Raises", BAR]), None)
        .await
        .unwrap();

    match &outcomes[0] {
        RunOutcome::Failed { kind, code, .. } => {
            assert_eq!(kind, "contract_violation");
            assert_eq!(code.as_deref(), Some(NO_ENTRY_POINT_CODE.trim()));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    match &outcomes[1] {
        RunOutcome::Failed { kind, message, code, .. } => {
            assert_eq!(kind, "execution_error");
            assert!(message.contains("boom"));
            assert!(code.is_some());
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!outcomes[2].is_failure(), "later suggestions still run");
    assert_eq!(h.session.registry().len(), before + 1);
    // the missing entry point is caught before the runtime is involved
    assert_eq!(h.runtime.runs(), 2);
}

#[tokio::test]
async fn synthesis_failure_is_not_cached_and_can_be_retried() {
    let mut h = harness(ScriptedOracle::new().failing_for(HIST));

    let outcomes = h
        .session
        .run_selected(&selections(&[BAR, HIST]), None)
        .await
        .unwrap();
    assert!(!outcomes[0].is_failure());
    match &outcomes[1] {
        RunOutcome::Failed { kind, code, .. } => {
            assert_eq!(kind, "synthesis_failed");
            assert_eq!(code, &None);
        }
        other => panic!("expected failure, got {other:?}"),
    }

    h.oracle.set_failing(HIST, false);
    let retry = h
        .session
        .run_selected(&selections(&[BAR, HIST]), None)
        .await
        .unwrap();
    assert!(retry.iter().all(|o| !o.is_failure()));
    // BAR once, HIST failed once then succeeded
    assert_eq!(h.oracle.synthesis_calls(), 3);
}

#[tokio::test]
async fn metadata_title_drives_the_key() {
    let code = "# meta: {\"title\": \"Throughput per month\", \"type\": \"line_chart\"}\ndef build_plot(df):\n    return fig, meta\n";
    let mut h = harness(ScriptedOracle::new().with_code(BAR, code));

    let outcomes = h
        .session
        .run_selected(&selections(&[BAR]), None)
        .await
        .unwrap();
    let key = outcomes[0].key().unwrap();
    assert_eq!(key, &ArtifactKey::from_text("Throughput per month"));
    let artifact = h.session.registry().get(key).unwrap();
    assert_eq!(artifact.title(), "Throughput per month");
}

#[tokio::test]
async fn feedback_slot_is_bound_and_survives_reruns() {
    let mut h = harness(ScriptedOracle::new());
    let outcomes = h
        .session
        .run_selected(&selections(&[BAR]), None)
        .await
        .unwrap();
    let key = outcomes[0].key().unwrap().clone();

    let slot = h
        .session
        .registry()
        .annotation(&key, AnnotationKind::Feedback)
        .unwrap();
    assert_eq!(slot.text(), "");

    h.session.record_feedback(&key, "matches the source system");
    h.session
        .run_selected(&selections(&[BAR]), None)
        .await
        .unwrap();
    let slot = h
        .session
        .registry()
        .annotation(&key, AnnotationKind::Feedback)
        .unwrap();
    assert_eq!(slot.text(), "matches the source system");
}

#[tokio::test]
async fn report_shows_feedback_or_placeholder_and_is_deterministic() {
    let mut h = harness(ScriptedOracle::new());
    h.session.set_question("Is the log fit for conformance checking?");
    let outcomes = h
        .session
        .run_selected(&selections(&[BAR, HIST]), None)
        .await
        .unwrap();
    h.session
        .record_feedback(outcomes[0].key().unwrap(), "Looks plausible");

    let first = h.session.export_report(at()).unwrap();
    let second = h.session.export_report(at()).unwrap();
    assert_eq!(first, second);

    let html = String::from_utf8(first).unwrap();
    assert!(html.contains("Generated: 2024-06-01 12:00"));
    assert!(html.contains("Is the log fit for conformance checking?"));
    assert!(html.contains("Looks plausible"));
    // headline stats and the second chart have no feedback
    assert_eq!(html.matches(NO_COMMENT).count(), 2);

    let bar = html.find(BAR).unwrap();
    let hist = html.find(HIST).unwrap();
    assert!(bar < hist);
}

#[tokio::test]
async fn export_to_writes_only_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.html");

    let oracle = Arc::new(ScriptedOracle::new());
    let session = ExplorationSession::with_executor(
        EdeConfig::default(),
        oracle,
        SandboxedExecutor::with_runtime(SandboxConfig::default(), Arc::new(CannedRuntime::new())),
    );
    let err = session.export_report_to(&path, at()).await.unwrap_err();
    assert!(matches!(err, SessionError::Report(ReportError::EmptyReport)));
    assert!(!err.is_recoverable());
    assert!(!path.exists());

    let h = harness(ScriptedOracle::new());
    let written = h.session.export_report_to(&path, at()).await.unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), written as u64);
}

#[tokio::test]
async fn loading_a_dataset_resets_registry_and_cache() {
    let mut h = harness(ScriptedOracle::new());
    h.session
        .run_selected(&selections(&[BAR]), None)
        .await
        .unwrap();
    assert_eq!(synthesized_keys(&h.session).len(), 1);

    h.session.load_dataset(abcd_log());
    assert!(synthesized_keys(&h.session).is_empty());
    assert_eq!(h.session.registry().annotation_count(), 0);

    h.session
        .run_selected(&selections(&[BAR]), None)
        .await
        .unwrap();
    assert_eq!(h.oracle.synthesis_calls(), 2);
}

#[tokio::test]
async fn suggest_uses_question_and_requires_one() {
    let mut h = harness(ScriptedOracle::new().with_suggestions(&[BAR, HIST]));
    assert!(matches!(
        h.session.suggest().await,
        Err(SessionError::NoQuestion)
    ));

    h.session.set_question("Where do cases stall?");
    assert_eq!(h.session.suggest().await.unwrap(), selections(&[BAR, HIST]));
    assert_eq!(h.oracle.suggestion_calls(), 1);
}

#[tokio::test]
async fn run_without_dataset_is_an_error() {
    let oracle = Arc::new(ScriptedOracle::new());
    let mut session = ExplorationSession::with_executor(
        EdeConfig::default(),
        oracle,
        SandboxedExecutor::with_runtime(SandboxConfig::default(), Arc::new(CannedRuntime::new())),
    );
    assert!(matches!(
        session.run_selected(&selections(&[BAR]), None).await,
        Err(SessionError::NoDataset)
    ));
}

#[tokio::test]
async fn staleness_policy_controls_reuse_across_column_roles() {
    let other_roles = ColumnRoles::new("case", "act", "ts");

    let mut reuse = harness(ScriptedOracle::new());
    reuse
        .session
        .run_selected(&selections(&[BAR]), None)
        .await
        .unwrap();
    assert!(reuse.session.cache().contains(BAR, &other_roles).await);

    let mut keyed = harness_with(
        ScriptedOracle::new(),
        EdeConfig::default().with_staleness(StalenessPolicy::KeyByColumnRoles),
    );
    keyed
        .session
        .run_selected(&selections(&[BAR]), None)
        .await
        .unwrap();
    assert!(keyed.session.cache().contains(BAR, &ColumnRoles::xes()).await);
    assert!(!keyed.session.cache().contains(BAR, &other_roles).await);
}
