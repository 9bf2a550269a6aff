//! Text-completion oracle
//!
//! The oracle is an external chat-completion service. [`Oracle`] is the seam
//! the rest of the pipeline talks to; [`ChatCompletionsOracle`] implements it
//! over HTTP for OpenAI-compatible and Azure OpenAI deployments.

use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Default Azure OpenAI API version
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions
    System,
    /// Request content
    User,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleMessage {
    /// Speaker
    pub role: Role,
    /// Text
    pub content: String,
}

impl OracleMessage {
    /// System message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Conversation sent to the model
    pub messages: Vec<OracleMessage>,
    /// Sampling temperature
    pub temperature: f32,
}

impl OracleRequest {
    /// Text of the last user message, if any
    #[must_use]
    pub fn user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Text-completion service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete the conversation, returning the raw response text
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// API flavour of the endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleProvider {
    /// `POST {endpoint}/chat/completions` with bearer auth
    #[default]
    OpenAiCompatible,
    /// `POST {endpoint}/openai/deployments/{model}/chat/completions` with `api-key`
    Azure,
}

/// Connection settings for [`ChatCompletionsOracle`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// API flavour
    pub provider: OracleProvider,
    /// Base URL
    pub endpoint: String,
    /// Model name, or deployment name on Azure
    pub model: String,
    /// Azure API version
    pub api_version: Option<String>,
    /// Secret; usually supplied through the environment
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::OpenAiCompatible,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_version: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl OracleConfig {
    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full URL of the completions endpoint
    #[must_use]
    pub fn completions_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match self.provider {
            OracleProvider::OpenAiCompatible => format!("{base}/chat/completions"),
            OracleProvider::Azure => format!(
                "{base}/openai/deployments/{}/chat/completions?api-version={}",
                self.model,
                self.api_version.as_deref().unwrap_or(DEFAULT_AZURE_API_VERSION)
            ),
        }
    }
}

/// HTTP chat-completions client
#[derive(Debug, Clone)]
pub struct ChatCompletionsOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl ChatCompletionsOracle {
    /// Build client from config
    ///
    /// # Errors
    /// Returns [`OracleError::NotConfigured`] for an empty endpoint or model,
    /// or when the HTTP client cannot be built.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        if config.endpoint.trim().is_empty() {
            return Err(OracleError::NotConfigured("endpoint is empty".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(OracleError::NotConfigured("model is empty".to_string()));
        }
        if config.provider == OracleProvider::Azure && config.api_key.is_none() {
            return Err(OracleError::NotConfigured(
                "azure provider requires an api key".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| OracleError::NotConfigured(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn body(&self, request: &OracleRequest) -> Value {
        let mut body = json!({
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if self.config.provider == OracleProvider::OpenAiCompatible {
            body["model"] = Value::from(self.config.model.as_str());
        }
        body
    }
}

#[async_trait]
impl Oracle for ChatCompletionsOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = self.config.completions_url();
        tracing::debug!(%url, messages = request.messages.len(), "oracle request");

        let mut http = self.client.post(&url).json(&self.body(request));
        if let Some(key) = &self.config.api_key {
            http = match self.config.provider {
                OracleProvider::OpenAiCompatible => http.bearer_auth(key),
                OracleProvider::Azure => http.header("api-key", key),
            };
        }

        let response = http.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let json: Value = response.json().await?;
        extract_content(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response
fn extract_content(json: &Value) -> Result<String, OracleError> {
    let content = json
        .pointer("/choices/0/message/content")
        .ok_or_else(|| OracleError::MalformedResponse("missing choices[0].message.content".to_string()))?;
    match content {
        Value::String(text) if !text.trim().is_empty() => Ok(text.clone()),
        Value::String(_) | Value::Null => Err(OracleError::EmptyResponse),
        other => Err(OracleError::MalformedResponse(format!(
            "content is not a string: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn openai_url_and_body() {
        let oracle = ChatCompletionsOracle::new(OracleConfig {
            endpoint: "http://localhost:8080/v1/".to_string(),
            model: "small".to_string(),
            ..OracleConfig::default()
        })
        .unwrap();

        assert_eq!(
            oracle.config().completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
        let body = oracle.body(&OracleRequest {
            messages: vec![OracleMessage::user("hi")],
            temperature: 0.5,
        });
        assert_eq!(body["model"], "small");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn azure_url_uses_deployment_and_version() {
        let config = OracleConfig {
            provider: OracleProvider::Azure,
            endpoint: "https://res.openai.azure.com".to_string(),
            model: "gpt4o".to_string(),
            api_version: Some("2024-02-01".to_string()),
            api_key: Some("k".to_string()),
            ..OracleConfig::default()
        };
        assert_eq!(
            config.completions_url(),
            "https://res.openai.azure.com/openai/deployments/gpt4o/chat/completions?api-version=2024-02-01"
        );
        let oracle = ChatCompletionsOracle::new(config).unwrap();
        let body = oracle.body(&OracleRequest {
            messages: vec![],
            temperature: 0.4,
        });
        assert!(body.get("model").is_none());
    }

    #[test]
    fn azure_without_key_is_not_configured() {
        let err = ChatCompletionsOracle::new(OracleConfig {
            provider: OracleProvider::Azure,
            ..OracleConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, OracleError::NotConfigured(_)));
    }

    #[test]
    fn extract_content_variants() {
        let ok = json!({"choices": [{"message": {"content": "text"}}]});
        assert_eq!(extract_content(&ok).unwrap(), "text");

        let empty = json!({"choices": [{"message": {"content": "  "}}]});
        assert_eq!(extract_content(&empty), Err(OracleError::EmptyResponse));

        let null = json!({"choices": [{"message": {"content": null}}]});
        assert_eq!(extract_content(&null), Err(OracleError::EmptyResponse));

        let missing = json!({"error": "x"});
        assert!(matches!(
            extract_content(&missing),
            Err(OracleError::MalformedResponse(_))
        ));
    }

    #[test]
    fn user_text_picks_last_user_message() {
        let request = OracleRequest {
            messages: vec![
                OracleMessage::system("s"),
                OracleMessage::user("first"),
                OracleMessage::user("second"),
            ],
            temperature: 0.0,
        };
        assert_eq!(request.user_text(), Some("second"));
    }
}
