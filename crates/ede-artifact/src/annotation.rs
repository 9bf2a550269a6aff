//! Labeled text bound to an artifact key

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Annotation kind; declaration order is report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Explanatory note
    Note,
    /// Legend explaining symbols or constraint types
    Legend,
    /// Free-text feedback from the user
    Feedback,
}

impl AnnotationKind {
    /// All kinds in report order
    pub const ORDERED: [Self; 3] = [Self::Note, Self::Legend, Self::Feedback];

    /// Label used when the caller supplies none
    #[must_use]
    pub const fn default_label(self) -> &'static str {
        match self {
            Self::Note => "Note",
            Self::Legend => "Legend",
            Self::Feedback => "Feedback",
        }
    }
}

impl Display for AnnotationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Note => "note",
            Self::Legend => "legend",
            Self::Feedback => "feedback",
        })
    }
}

/// One labeled text block.
///
/// Empty text is a valid annotation: it records that the slot was bound
/// without content, which differs from no annotation at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    kind: AnnotationKind,
    label: String,
    text: String,
}

impl Annotation {
    /// Create annotation; a blank label becomes the kind's default label
    #[must_use]
    pub fn new(kind: AnnotationKind, label: impl Into<String>, text: impl Into<String>) -> Self {
        let label = label.into();
        let label = if label.trim().is_empty() {
            kind.default_label().to_string()
        } else {
            label
        };
        Self {
            kind,
            label,
            text: text.into(),
        }
    }

    /// Kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    /// Label shown before the text
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Raw text as attached
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when the text has no visible content
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
