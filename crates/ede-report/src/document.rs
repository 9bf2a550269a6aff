//! Typed report document
//!
//! The assembler produces a [`Report`]; renderers only read it. Keeping the
//! linearized form explicit makes ordering and placeholder rules testable
//! without parsing rendered output.

use chrono::NaiveDateTime;
use ede_artifact::{AnnotationKind, ArtifactKey};
use serde::{Deserialize, Serialize};

/// Default document title
pub const DEFAULT_TITLE: &str = "Data Validation Report";

/// Text shown when an artifact received no feedback
pub const NO_COMMENT: &str = "– (no comment provided)";

/// 16 cm at 96 dpi
pub const DEFAULT_MAX_IMAGE_WIDTH_PX: u32 = 605;

/// Header of key/value tables
pub const KEY_VALUE_HEADER: [&str; 2] = ["Statistic", "Value"];

/// Closing row of a table whose capture was cut short
#[must_use]
pub fn truncation_note(omitted: u64) -> String {
    format!("… {omitted} more rows not shown")
}

/// Layout settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Document title
    pub title: String,
    /// Feedback placeholder
    pub placeholder: String,
    /// Widest image, in CSS pixels
    pub max_image_width_px: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            placeholder: NO_COMMENT.to_string(),
            max_image_width_px: DEFAULT_MAX_IMAGE_WIDTH_PX,
        }
    }
}

/// The whole document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Title
    pub title: String,
    /// Generation time shown in the header
    pub generated_at: NaiveDateTime,
    /// Analysis question, if one was asked
    pub question: Option<String>,
    /// One section per artifact, in registry order
    pub sections: Vec<ReportSection>,
}

impl Report {
    /// `Generated: YYYY-MM-DD HH:MM`
    #[must_use]
    pub fn generated_line(&self) -> String {
        format!("Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M"))
    }

    /// Section keys in document order
    #[must_use]
    pub fn keys(&self) -> Vec<&ArtifactKey> {
        self.sections.iter().map(|s| &s.key).collect()
    }
}

/// One artifact and its text blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    /// Artifact key
    pub key: ArtifactKey,
    /// Heading
    pub title: String,
    /// Rendered artifact
    pub body: Block,
    /// Note, legend, then feedback
    pub texts: Vec<TextBlock>,
}

impl ReportSection {
    /// Text block of a kind
    #[must_use]
    pub fn text(&self, kind: AnnotationKind) -> Option<&TextBlock> {
        self.texts.iter().find(|t| t.kind == kind)
    }
}

/// Artifact body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Embedded image at its display size
    Image {
        /// Encoded bytes
        bytes: Vec<u8>,
        /// MIME type
        mime: String,
        /// Display width, CSS px
        width: u32,
        /// Display height, CSS px
        height: u32,
    },
    /// Image without bytes or with unreadable bytes
    ImageMissing,
    /// Grid with wrapping cells
    Table {
        /// Header cells
        header: Vec<String>,
        /// Body rows
        rows: Vec<Vec<String>>,
    },
}

/// Labeled text under an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    /// Annotation kind
    pub kind: AnnotationKind,
    /// Label, rendered bold with a trailing colon
    pub label: String,
    /// Body text
    pub text: String,
    /// True when `text` is the no-feedback placeholder
    pub placeholder: bool,
}
