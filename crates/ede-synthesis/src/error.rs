//! Error types for oracle access and code synthesis

use std::time::Duration;

/// Failures talking to the text-completion oracle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Missing endpoint, model or key
    #[error("oracle not configured: {0}")]
    NotConfigured(String),

    /// Connection or protocol failure
    #[error("oracle unreachable: {0}")]
    Unreachable(String),

    /// Non-success HTTP status
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response did not have the expected shape
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),

    /// Response contained no usable text
    #[error("oracle returned empty text")]
    EmptyResponse,

    /// No answer within the configured time
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

/// Errors surfaced by suggestion generation and the synthesis cache
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// Oracle unreachable or produced nothing usable; nothing was cached
    #[error("synthesis failed for '{subject}': {source}")]
    SynthesisFailed {
        subject: String,
        #[source]
        source: OracleError,
    },
}

impl SynthesisError {
    /// Create synthesis failure for a suggestion or question
    pub fn failed(subject: impl Into<String>, source: OracleError) -> Self {
        Self::SynthesisFailed {
            subject: subject.into(),
            source,
        }
    }
}

/// Result type alias for synthesis operations
pub type SynthesisResult<T> = Result<T, SynthesisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_failed_display_names_subject() {
        let err = SynthesisError::failed("Bar chart of X", OracleError::EmptyResponse);
        assert_eq!(
            err.to_string(),
            "synthesis failed for 'Bar chart of X': oracle returned empty text"
        );
    }

    #[test]
    fn timeout_display() {
        let err = OracleError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "oracle call timed out after 30s");
    }
}
