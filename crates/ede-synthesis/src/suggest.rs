//! Suggestion generation

use crate::error::{OracleError, SynthesisError, SynthesisResult};
use crate::oracle::Oracle;
use crate::parse::parse_suggestions;
use crate::prompt::suggestion_request;
use std::time::Duration;

/// Ask the oracle for chart ideas answering `question`.
///
/// # Errors
/// [`SynthesisError::SynthesisFailed`] when the oracle fails, times out or
/// answers without any usable suggestion lines.
pub async fn suggest(
    oracle: &dyn Oracle,
    question: &str,
    excluded_labels: &[String],
    timeout: Duration,
) -> SynthesisResult<Vec<String>> {
    let request = suggestion_request(question, excluded_labels);
    tracing::info!(excluded = excluded_labels.len(), "requesting suggestions");

    let raw = tokio::time::timeout(timeout, oracle.complete(&request))
        .await
        .map_err(|_| SynthesisError::failed(question, OracleError::Timeout(timeout)))?
        .map_err(|e| SynthesisError::failed(question, e))?;

    let suggestions = parse_suggestions(&raw);
    if suggestions.is_empty() {
        tracing::warn!("oracle response contained no suggestions");
        return Err(SynthesisError::failed(question, OracleError::EmptyResponse));
    }
    tracing::info!(count = suggestions.len(), "received suggestions");
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockOracle;
    use pretty_assertions::assert_eq;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn returns_cleaned_suggestions() {
        let mut oracle = MockOracle::new();
        oracle
            .expect_complete()
            .withf(|req| req.user_text() == Some("My analysis question is: Why so slow?"))
            .times(1)
            .returning(|_| Ok("- Bar chart of X\n- Histogram of Y\n".to_string()));

        let out = suggest(&oracle, "Why so slow?", &[], TIMEOUT).await.unwrap();
        assert_eq!(out, vec!["Bar chart of X", "Histogram of Y"]);
    }

    #[tokio::test]
    async fn blank_response_is_synthesis_failed() {
        for reply in ["   \n", "## Ideas\n\n"] {
            let mut oracle = MockOracle::new();
            oracle
                .expect_complete()
                .returning(move |_| Ok(reply.to_string()));

            let err = suggest(&oracle, "q", &[], TIMEOUT).await.unwrap_err();
            assert_eq!(err, SynthesisError::failed("q", OracleError::EmptyResponse));
        }
    }

    #[tokio::test]
    async fn oracle_failure_is_synthesis_failed() {
        let mut oracle = MockOracle::new();
        oracle
            .expect_complete()
            .returning(|_| Err(OracleError::Unreachable("connection refused".to_string())));

        let err = suggest(&oracle, "q", &[], TIMEOUT).await.unwrap_err();
        assert!(matches!(err, SynthesisError::SynthesisFailed { ref subject, .. } if subject == "q"));
    }
}
