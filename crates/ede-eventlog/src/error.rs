//! Error types for event log handling

/// Errors raised by event log construction and coverage filtering
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// Bad threshold or empty dataset
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record lacks one of the mandatory columns
    #[error("record {index}: missing or null column '{column}'")]
    MissingField { index: usize, column: String },

    /// A timestamp could not be parsed
    #[error("record {index}: invalid timestamp '{value}': {message}")]
    InvalidTimestamp {
        index: usize,
        value: String,
        message: String,
    },

    /// Input is not a list of JSON objects
    #[error("malformed records: {0}")]
    Malformed(String),

    /// JSON encoding/decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EventLogError {
    /// Create invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create missing field error
    pub fn missing_field(index: usize, column: impl Into<String>) -> Self {
        Self::MissingField {
            index,
            column: column.into(),
        }
    }
}

/// Result type alias for event log operations
pub type EventLogResult<T> = Result<T, EventLogError>;
