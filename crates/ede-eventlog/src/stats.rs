//! Built-in process analyses registered next to synthesized ones

use crate::coverage::CoverageSelection;
use crate::event::EventLog;
use ede_artifact::{Artifact, ArtifactKey, ArtifactMetadata, ArtifactPayload};
use serde_json::{Map, Value};

/// Registry key of the headline statistics table
pub const PROCESS_STATS_KEY: &str = "proc_stats_summary";

/// Registry key of the coverage filter summary table
pub const COVERAGE_SUMMARY_KEY: &str = "proc_variant_filter";

const TOP_ROWS: usize = 3;
const TOP_META: usize = 5;

/// Typical start and end activities, top three each with their share of cases
#[must_use]
pub fn process_headline_stats(log: &EventLog) -> Artifact {
    let cases = log.cases();
    let starts = ranked(cases.iter().filter_map(|c| c.events.first().map(|e| e.activity.as_str())));
    let ends = ranked(cases.iter().filter_map(|c| c.events.last().map(|e| e.activity.as_str())));

    let mut rows = share_rows("Typical starting event", &starts);
    rows.extend(share_rows("Typical ending event", &ends));

    let mut metadata = ArtifactMetadata::titled("Process-centric headline stats");
    metadata.chart_type = Some("table".to_string());
    metadata.extra.insert("top_start_activities".to_string(), top_map(&starts));
    metadata.extra.insert("top_end_activities".to_string(), top_map(&ends));

    tracing::debug!(cases = cases.len(), "computed process headline stats");
    Artifact::new(
        ArtifactKey::new(PROCESS_STATS_KEY),
        "Process-centric headline stats",
        ArtifactPayload::KeyValueTable { rows },
    )
    .with_metadata(metadata)
}

/// Summary table of a coverage filter run
#[must_use]
pub fn coverage_summary(selection: &CoverageSelection) -> Artifact {
    let mut metadata = ArtifactMetadata::titled("Variant coverage filter");
    metadata.chart_type = Some("filter".to_string());
    metadata.extra.insert(
        "coverage_threshold".to_string(),
        Value::from(selection.threshold().value()),
    );
    metadata.extra.insert(
        "selected_variants_count".to_string(),
        Value::from(selection.selected().len()),
    );
    metadata
        .extra
        .insert("total_cases".to_string(), Value::from(selection.total_cases()));
    metadata.extra.insert(
        "retained_cases".to_string(),
        Value::from(selection.retained_cases()),
    );

    Artifact::new(
        ArtifactKey::new(COVERAGE_SUMMARY_KEY),
        "Variant coverage filter",
        ArtifactPayload::KeyValueTable {
            rows: selection.summary_rows(),
        },
    )
    .with_metadata(metadata)
}

/// Counts by label, descending, ties in encounter order
fn ranked<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[allow(clippy::cast_precision_loss)]
fn share_rows(prefix: &str, ranked: &[(&str, usize)]) -> Vec<(String, String)> {
    let total: usize = ranked.iter().map(|(_, n)| n).sum();
    ranked
        .iter()
        .take(TOP_ROWS)
        .enumerate()
        .map(|(i, (label, n))| {
            let share = if total == 0 { 0.0 } else { *n as f64 / total as f64 * 100.0 };
            (format!("{prefix} #{}", i + 1), format!("{label}: {share:.2}%"))
        })
        .collect()
}

fn top_map(ranked: &[(&str, usize)]) -> Value {
    let map: Map<String, Value> = ranked
        .iter()
        .take(TOP_META)
        .map(|(label, n)| ((*label).to_string(), Value::from(*n)))
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::coverage_filter;
    use crate::event::{ColumnRoles, Event};
    use chrono::{TimeZone, Utc};
    use ede_artifact::ArtifactKind;
    use pretty_assertions::assert_eq;

    fn log() -> EventLog {
        let t = |s: i64| Utc.timestamp_opt(1_700_000_000 + s, 0).unwrap();
        EventLog::new(
            ColumnRoles::xes(),
            vec![
                Event::new("1", "Register", t(0)),
                Event::new("1", "Pay", t(5)),
                Event::new("2", "Register", t(1)),
                Event::new("2", "Cancel", t(6)),
                Event::new("3", "Pay", t(9)),
                Event::new("3", "Register", t(2)),
                Event::new("4", "Check", t(3)),
                Event::new("4", "Pay", t(7)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn headline_stats_rank_start_and_end_activities() {
        let artifact = process_headline_stats(&log());
        assert_eq!(artifact.key().as_str(), PROCESS_STATS_KEY);
        assert_eq!(artifact.kind(), ArtifactKind::KeyValueTable);

        let ArtifactPayload::KeyValueTable { rows } = artifact.payload() else {
            panic!("expected key/value table");
        };
        assert_eq!(
            rows[0],
            (
                "Typical starting event #1".to_string(),
                "Register: 75.00%".to_string()
            )
        );
        assert_eq!(rows[1].1, "Check: 25.00%");
        assert_eq!(
            rows[2],
            (
                "Typical ending event #1".to_string(),
                "Pay: 75.00%".to_string()
            )
        );
        assert_eq!(
            artifact.metadata().extra("top_end_activities"),
            Some(&serde_json::json!({"Pay": 3, "Cancel": 1}))
        );
    }

    #[test]
    fn coverage_summary_carries_counts() {
        let selection = coverage_filter(&log(), 0.5).unwrap();
        let artifact = coverage_summary(&selection);
        assert_eq!(artifact.key().as_str(), COVERAGE_SUMMARY_KEY);
        assert_eq!(
            artifact.metadata().extra("total_cases"),
            Some(&Value::from(4))
        );
        assert_eq!(artifact.metadata().chart_type.as_deref(), Some("filter"));
    }
}
