//! Case variants
//!
//! A variant is the ordered activity sequence of one case. Variants are
//! derived from the log on demand and never stored alongside it.

use crate::event::EventLog;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Ordered activity sequence; duplicates are kept
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variant(Vec<String>);

impl Variant {
    /// Create from activity labels
    #[must_use]
    pub fn new<I, S>(activities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(activities.into_iter().map(Into::into).collect())
    }

    /// Activity labels
    #[inline]
    #[must_use]
    pub fn activities(&self) -> &[String] {
        &self.0
    }

    /// Number of activities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if variant has no activities
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" → "))
    }
}

/// A variant and the cases following it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCount {
    /// The activity sequence
    pub variant: Variant,
    /// Number of cases with this sequence
    pub cases: usize,
    /// Case ids in order of first appearance
    pub case_ids: Vec<String>,
}

/// Variants with case counts, in first-encountered order
#[must_use]
pub fn variant_counts(log: &EventLog) -> Vec<VariantCount> {
    let mut slots: HashMap<Variant, usize> = HashMap::new();
    let mut counts: Vec<VariantCount> = Vec::new();
    for case in log.cases() {
        let variant = Variant::new(case.events.iter().map(|e| e.activity.as_str()));
        let slot = match slots.get(&variant) {
            Some(slot) => *slot,
            None => {
                slots.insert(variant.clone(), counts.len());
                counts.push(VariantCount {
                    variant,
                    cases: 0,
                    case_ids: Vec::new(),
                });
                counts.len() - 1
            }
        };
        counts[slot].cases += 1;
        counts[slot].case_ids.push(case.id.to_string());
    }
    counts
}
