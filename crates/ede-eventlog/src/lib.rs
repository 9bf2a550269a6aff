//! EDE Event Log
//!
//! Read-only event log model and the deterministic variant-coverage filter
//! that bounds which cases downstream analyses see.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use ede_eventlog::{coverage_filter, ColumnRoles, Event, EventLog};
//!
//! let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//! let log = EventLog::new(
//!     ColumnRoles::xes(),
//!     vec![
//!         Event::new("c1", "Register", t),
//!         Event::new("c2", "Register", t),
//!         Event::new("c3", "Cancel", t),
//!     ],
//! )
//! .unwrap();
//!
//! let selection = coverage_filter(&log, 0.6).unwrap();
//! assert_eq!(selection.retained_cases(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod coverage;
mod error;
mod event;
mod stats;
mod variant;

pub use coverage::{
    coverage_filter, CoverageFilter, CoverageProvenance, CoverageSelection, CoverageThreshold,
    DEFAULT_COVERAGE,
};
pub use error::{EventLogError, EventLogResult};
pub use event::{Case, ColumnRoles, Event, EventLog};
pub use stats::{coverage_summary, process_headline_stats, COVERAGE_SUMMARY_KEY, PROCESS_STATS_KEY};
pub use variant::{variant_counts, Variant, VariantCount};
