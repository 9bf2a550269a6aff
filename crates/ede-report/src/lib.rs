//! EDE Report
//!
//! Turns the artifact registry into one printable document. Assembly is a
//! pure projection: the same registry and annotations always produce the
//! same bytes for a given generation time.
//!
//! ```rust
//! use chrono::NaiveDate;
//! use ede_artifact::{Artifact, ArtifactKey, ArtifactPayload, ArtifactRegistry};
//! use ede_report::ReportAssembler;
//!
//! let mut registry = ArtifactRegistry::new();
//! registry.upsert(Artifact::new(
//!     ArtifactKey::new("stats"),
//!     "Headline statistics",
//!     ArtifactPayload::KeyValueTable { rows: vec![("cases".into(), "42".into())] },
//! ));
//!
//! let at = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let bytes = ReportAssembler::default().build_report(&registry, None, at).unwrap();
//! assert!(String::from_utf8(bytes).unwrap().contains("no comment provided"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod assembler;
mod document;
mod error;
mod html;
mod scale;

pub use assembler::{dedupe_last_wins, ReportAssembler};
pub use document::{
    Block, Report, ReportSection, ReportSettings, TextBlock, DEFAULT_MAX_IMAGE_WIDTH_PX,
    truncation_note, DEFAULT_TITLE, KEY_VALUE_HEADER, NO_COMMENT,
};
pub use error::{ReportError, ReportResult};
pub use html::render_html;
pub use scale::{dimensions, fit_width};
