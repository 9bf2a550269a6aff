//! Error types for report export

use std::path::PathBuf;

/// Errors raised while exporting a report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Nothing registered; nothing is written
    #[error("no artifacts registered; nothing to export")]
    EmptyReport,

    /// Writing the document failed
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for report operations
pub type ReportResult<T> = Result<T, ReportError>;
