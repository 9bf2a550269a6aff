//! Error types for EDE Core
//!
//! [`SessionError`] wraps the component errors and encodes which failures
//! a session survives.

use ede_eventlog::EventLogError;
use ede_report::ReportError;
use ede_synthesis::SynthesisError;
use std::path::PathBuf;

/// Errors raised by an exploration session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Bad coverage threshold or unusable dataset
    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// Oracle failed for one suggestion or question
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// Export failed or had nothing to export
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// Operation needs a dataset
    #[error("no dataset loaded")]
    NoDataset,

    /// Operation needs an analysis question
    #[error("no analysis question set")]
    NoQuestion,
}

impl SessionError {
    /// True when the session keeps all its state and can continue.
    ///
    /// Only export failures are reported to the export caller without
    /// recovery.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Report(_))
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`crate::EdeConfig`]
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Values out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
