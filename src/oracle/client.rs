//! OpenAI-compatible oracle client.
//!
//! Sends single-turn, non-streaming chat completion requests. No transport
//! retries: the caller's retry budget is the correction pipeline's circuit
//! breaker.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::OracleError;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use super::{Oracle, OracleRequest};
use crate::config::OracleConfig;

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── HttpOracle ──────────────────────────────────────────────────────────────

/// Oracle backed by an OpenAI Chat Completions endpoint.
pub struct HttpOracle {
    http: HttpClient,
    /// Full `…/chat/completions` URL.
    url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpOracle {
    /// Build a client from the `oracle` section of the config.
    ///
    /// Does NOT check connectivity; that happens on the first request.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        if config.base_url.trim().is_empty() {
            return Err(OracleError::ConfigError {
                reason: "oracle.base_url is empty".into(),
            });
        }
        if config.model.trim().is_empty() {
            return Err(OracleError::ConfigError {
                reason: "oracle.model is empty".into(),
            });
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            url: completions_url(&config.base_url),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            timeout,
        })
    }

    /// The endpoint this client posts to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn send(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(&request.system_prompt),
                ChatMessage::user(&request.user_prompt),
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        tracing::debug!(
            url = %self.url,
            model = %body.model,
            max_tokens = body.max_tokens,
            "oracle request"
        );

        let mut builder = self.http.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout {
                    duration_ms: self.timeout.as_millis() as u64,
                }
            } else {
                OracleError::ConnectionFailed {
                    endpoint: self.url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "oracle returned non-success status");
            return Err(OracleError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| OracleError::InvalidResponse {
                reason: format!("failed to read response body: {e}"),
            })?;

        parse_completion_body(&body_text)
    }
}

/// Append `/chat/completions` unless the base URL already ends with it.
fn completions_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/chat/completions")
    }
}

/// Extract the first choice's `content` from a non-streaming response body.
///
/// Reasoning models that exhaust `max_tokens` before answering leave
/// `content` empty; that is reported as `EmptyResponse`.
pub fn parse_completion_body(body: &str) -> Result<String, OracleError> {
    let resp: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidResponse {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    let choice = resp.choices.first().ok_or(OracleError::InvalidResponse {
        reason: "empty choices array".into(),
    })?;

    choice
        .message
        .content
        .clone()
        .filter(|c| !c.trim().is_empty())
        .ok_or(OracleError::EmptyResponse)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, model: &str) -> OracleConfig {
        OracleConfig {
            base_url: base_url.into(),
            model: model.into(),
            ..OracleConfig::default()
        }
    }

    #[test]
    fn test_completions_url_appends_path() {
        assert_eq!(
            completions_url("http://localhost:11434/v1/"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            completions_url("https://api.example.com/v1/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_from_config_rejects_empty_model() {
        let result = HttpOracle::from_config(&config("http://localhost:11434/v1", " "));
        assert!(matches!(result, Err(OracleError::ConfigError { .. })));
    }

    #[test]
    fn test_from_config_builds_url() {
        let oracle = HttpOracle::from_config(&config("http://localhost:11434/v1", "qwen")).unwrap();
        assert_eq!(oracle.url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_parse_completion_body_content() {
        let body = r#"{"choices":[{"message":{"content":"NO"},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_completion_body(body).unwrap(), "NO");
    }

    #[test]
    fn test_parse_completion_body_reasoning_only_is_empty() {
        let body = r#"{"choices":[{"message":{"content":"","reasoning":"thinking..."}}]}"#;
        assert!(matches!(
            parse_completion_body(body),
            Err(OracleError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_completion_body_no_choices() {
        assert!(matches!(
            parse_completion_body(r#"{"choices":[]}"#),
            Err(OracleError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_completion_body("not json"),
            Err(OracleError::InvalidResponse { .. })
        ));
    }
}
