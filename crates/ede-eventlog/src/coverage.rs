//! Variant coverage filter
//!
//! Keeps the fewest most-frequent variants whose cumulative case share
//! reaches a threshold.
//!
//! # Algorithm
//! 1. Count cases per variant (first-encountered order).
//! 2. Stable sort by count, descending; ties keep encounter order.
//! 3. Accumulate until `running / total >= threshold`; the stopping variant
//!    is included.
//! 4. Keep every event of every case whose variant was selected.
//!
//! A filtered log remembers the threshold and the case total of the log it
//! came from ([`CoverageProvenance`]). Refiltering measures shares against
//! that original total, so `filter(filter(log, a), b)` equals
//! `filter(log, min(a, b))` and refiltering at the same threshold is a no-op.

use crate::error::{EventLogError, EventLogResult};
use crate::event::EventLog;
use crate::variant::{variant_counts, Variant, VariantCount};
use ede_artifact::ContentHash;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Default threshold used by the process exploration page
pub const DEFAULT_COVERAGE: f64 = 0.8;

/// Coverage threshold in `(0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CoverageThreshold(f64);

impl CoverageThreshold {
    /// Validate a threshold
    ///
    /// # Errors
    /// Returns [`EventLogError::InvalidArgument`] unless `0 < value <= 1`.
    pub fn new(value: f64) -> EventLogResult<Self> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(EventLogError::invalid_argument(format!(
                "coverage threshold must be in (0, 1], got {value}"
            )))
        }
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for CoverageThreshold {
    fn default() -> Self {
        Self(DEFAULT_COVERAGE)
    }
}

impl TryFrom<f64> for CoverageThreshold {
    type Error = EventLogError;

    fn try_from(value: f64) -> EventLogResult<Self> {
        Self::new(value)
    }
}

impl From<CoverageThreshold> for f64 {
    fn from(threshold: CoverageThreshold) -> Self {
        threshold.0
    }
}

impl Display for CoverageThreshold {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.0)
    }
}

/// Record of the filter that produced a log
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageProvenance {
    /// Threshold applied
    pub threshold: f64,
    /// Case count of the unfiltered log
    pub source_cases: usize,
}

/// Result of a coverage filter run
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSelection {
    log: EventLog,
    selected: Vec<VariantCount>,
    total_cases: usize,
    retained_cases: usize,
    threshold: CoverageThreshold,
}

impl CoverageSelection {
    /// Filtered log
    #[inline]
    #[must_use]
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Take the filtered log
    #[must_use]
    pub fn into_log(self) -> EventLog {
        self.log
    }

    /// Selected variants, most frequent first
    #[inline]
    #[must_use]
    pub fn selected(&self) -> &[VariantCount] {
        &self.selected
    }

    /// Check if a variant was selected
    #[must_use]
    pub fn includes(&self, variant: &Variant) -> bool {
        self.selected.iter().any(|v| &v.variant == variant)
    }

    /// Cases in the unfiltered log
    #[inline]
    #[must_use]
    pub fn total_cases(&self) -> usize {
        self.total_cases
    }

    /// Cases kept
    #[inline]
    #[must_use]
    pub fn retained_cases(&self) -> usize {
        self.retained_cases
    }

    /// Threshold applied
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> CoverageThreshold {
        self.threshold
    }

    /// Share of cases kept
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn share(&self) -> f64 {
        if self.total_cases == 0 {
            0.0
        } else {
            self.retained_cases as f64 / self.total_cases as f64
        }
    }

    /// Rows for the `proc_variant_filter` summary table
    #[must_use]
    pub fn summary_rows(&self) -> Vec<(String, String)> {
        vec![
            ("Coverage threshold".to_string(), self.threshold.to_string()),
            (
                "Selected variants".to_string(),
                self.selected.len().to_string(),
            ),
            ("Total cases".to_string(), self.total_cases.to_string()),
            ("Retained cases".to_string(), self.retained_cases.to_string()),
        ]
    }
}

/// Filter `log` down to the most frequent variants covering `threshold`.
///
/// The input is never modified; the result owns a copy of the kept events.
///
/// # Errors
/// Returns [`EventLogError::InvalidArgument`] for an empty log or a threshold
/// outside `(0, 1]`.
pub fn coverage_filter(log: &EventLog, threshold: f64) -> EventLogResult<CoverageSelection> {
    let threshold = CoverageThreshold::new(threshold)?;
    if log.is_empty() {
        return Err(EventLogError::invalid_argument(
            "cannot filter an empty event log",
        ));
    }

    let mut counts = variant_counts(log);
    let log_cases: usize = counts.iter().map(|v| v.cases).sum();
    let total_cases = log.provenance().map_or(log_cases, |p| p.source_cases);

    // sort_by is stable: equal counts keep encounter order
    counts.sort_by(|a, b| b.cases.cmp(&a.cases));

    let mut running = 0usize;
    let mut cut = counts.len();
    for (i, count) in counts.iter().enumerate() {
        running += count.cases;
        if reaches(running, total_cases, threshold) {
            cut = i + 1;
            break;
        }
    }
    counts.truncate(cut);
    let retained_cases = counts.iter().map(|v| v.cases).sum::<usize>();

    let filtered = if retained_cases == log_cases {
        // everything kept; only tighten the recorded threshold
        let provenance = match log.provenance() {
            Some(p) if p.threshold <= threshold.value() => *p,
            _ => CoverageProvenance {
                threshold: threshold.value(),
                source_cases: total_cases,
            },
        };
        EventLog::filtered(log.roles().clone(), log.events().to_vec(), provenance)
    } else {
        let keep: HashSet<&str> = counts
            .iter()
            .flat_map(|v| v.case_ids.iter().map(String::as_str))
            .collect();
        let events = log
            .events()
            .iter()
            .filter(|e| keep.contains(e.case_id.as_str()))
            .cloned()
            .collect();
        EventLog::filtered(
            log.roles().clone(),
            events,
            CoverageProvenance {
                threshold: threshold.value(),
                source_cases: total_cases,
            },
        )
    };

    tracing::debug!(
        threshold = threshold.value(),
        selected = counts.len(),
        total_cases,
        retained_cases,
        "coverage filter applied"
    );

    Ok(CoverageSelection {
        log: filtered,
        selected: counts,
        total_cases,
        retained_cases,
        threshold,
    })
}

#[allow(clippy::cast_precision_loss)]
fn reaches(running: usize, total: usize, threshold: CoverageThreshold) -> bool {
    total > 0 && running as f64 / total as f64 >= threshold.value()
}

/// Memoizing front for [`coverage_filter`], keyed by log fingerprint and threshold
#[derive(Clone)]
pub struct CoverageFilter {
    cache: Cache<(ContentHash, u64), Arc<CoverageSelection>>,
}

impl CoverageFilter {
    /// Create memo holding up to `capacity` selections
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity),
        }
    }

    /// Filter, reusing an earlier result for the same log and threshold
    ///
    /// # Errors
    /// Same as [`coverage_filter`]; errors are not memoized.
    pub fn apply(&self, log: &EventLog, threshold: f64) -> EventLogResult<Arc<CoverageSelection>> {
        let key = (log.fingerprint(), threshold.to_bits());
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!(dataset = %key.0.short(), threshold, "coverage memo hit");
            return Ok(hit);
        }
        let selection = Arc::new(coverage_filter(log, threshold)?);
        self.cache.insert(key, Arc::clone(&selection));
        Ok(selection)
    }

    /// Forget all memoized selections
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for CoverageFilter {
    fn default() -> Self {
        Self::new(64)
    }
}

impl fmt::Debug for CoverageFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageFilter")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
