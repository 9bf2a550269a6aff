//! Captured analysis results
//!
//! An [`Artifact`] is one exportable result: a bitmap image, a key/value table
//! or a row table, addressed by a stable [`ArtifactKey`].

use crate::metadata::ArtifactMetadata;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Prefix used for keys derived from free text
pub const DEFAULT_KEY_PREFIX: &str = "ix";

/// Maximum number of slug characters kept after the prefix
pub const MAX_SLUG_LEN: usize = 40;

/// Stable identifier of an artifact, unique within a registry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Use `key` verbatim
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a key from free text with the default `ix` prefix
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::slugified(DEFAULT_KEY_PREFIX, text)
    }

    /// Derive `<prefix>_<slug>` from free text.
    ///
    /// Runs of non-alphanumeric ASCII collapse to a single `-`, the result is
    /// lowercased, trimmed of dashes and capped at [`MAX_SLUG_LEN`] characters.
    /// Text without any alphanumerics becomes `plot`.
    #[must_use]
    pub fn slugified(prefix: &str, text: &str) -> Self {
        Self(format!("{prefix}_{}", slugify(text)))
    }

    /// Key as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        return "plot".to_string();
    }
    // ASCII only, so byte truncation is a char boundary
    slug.truncate(MAX_SLUG_LEN);
    slug
}

/// Kind of artifact, derived from its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Encoded bitmap (PNG)
    Image,
    /// Two-column statistic/value table
    KeyValueTable,
    /// Table with named columns
    RowTable,
}

impl ArtifactKind {
    /// Stable lowercase identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::KeyValueTable => "key_value_table",
            Self::RowTable => "row_table",
        }
    }
}

/// Artifact content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactPayload {
    /// Encoded image bytes; empty bytes mean the producer captured nothing
    Image {
        /// Encoded image
        bytes: Vec<u8>,
        /// MIME type, `image/png` for figures
        mime: String,
    },
    /// Statistic/value pairs
    KeyValueTable {
        /// Rows in display order
        rows: Vec<(String, String)>,
    },
    /// Column-named rows
    RowTable {
        /// Header cells
        columns: Vec<String>,
        /// Body rows, each ideally `columns.len()` wide
        rows: Vec<Vec<String>>,
    },
}

impl ArtifactPayload {
    /// PNG image payload
    #[must_use]
    pub fn png(bytes: Vec<u8>) -> Self {
        Self::Image {
            bytes,
            mime: "image/png".to_string(),
        }
    }

    /// Kind of this payload
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        match self {
            Self::Image { .. } => ArtifactKind::Image,
            Self::KeyValueTable { .. } => ArtifactKind::KeyValueTable,
            Self::RowTable { .. } => ArtifactKind::RowTable,
        }
    }
}

/// Captured analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    key: ArtifactKey,
    title: String,
    payload: ArtifactPayload,
    #[serde(default)]
    metadata: ArtifactMetadata,
}

impl Artifact {
    /// Create an artifact; an empty title falls back to the key
    #[must_use]
    pub fn new(key: ArtifactKey, title: impl Into<String>, payload: ArtifactPayload) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            key.to_string()
        } else {
            title
        };
        Self {
            key,
            title,
            payload,
            metadata: ArtifactMetadata::default(),
        }
    }

    /// Attach metadata
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: ArtifactMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Registry key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Display title
    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Kind, derived from the payload
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.payload.kind()
    }

    /// Content
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &ArtifactPayload {
        &self.payload
    }

    /// Producer metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }
}
