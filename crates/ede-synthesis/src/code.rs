//! Synthesized analysis code

use ede_artifact::ContentHash;
use ede_eventlog::ColumnRoles;
use serde::{Deserialize, Serialize};

/// Source text defining the analysis entry point, as cached per suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedCode {
    suggestion: String,
    source: String,
    hash: ContentHash,
    roles: ColumnRoles,
}

impl SynthesizedCode {
    /// Wrap cleaned source produced for `suggestion` against `roles`
    #[must_use]
    pub fn new(suggestion: impl Into<String>, source: impl Into<String>, roles: ColumnRoles) -> Self {
        let source: String = source.into();
        let hash = ContentHash::compute(source.as_bytes());
        Self {
            suggestion: suggestion.into(),
            source,
            hash,
            roles,
        }
    }

    /// Suggestion this code implements
    #[inline]
    #[must_use]
    pub fn suggestion(&self) -> &str {
        &self.suggestion
    }

    /// Source text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Blake3 hash of the source
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Column roles the oracle was told about
    #[inline]
    #[must_use]
    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }
}
