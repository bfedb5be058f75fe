//! Reference HTTP-backed generation client.
//!
//! Speaks the common chat-completions wire shape. Connection failures and
//! 5xx responses are retried with backoff; once the retry budget is spent
//! they surface as `GenerationUnavailable` so the channel transport can
//! apply its own retry policy. Non-retryable API errors surface as
//! single-call `Generation` failures recovered by the calling worker.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Error, Result};
use crate::state::Role;

use super::{GenerationClient, GenerationRequest};

const PROVIDER: &str = "http";

/// Configuration for the HTTP generation client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Model identifier sent with every request
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures before reporting unavailability
    pub max_retries: u32,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: model.into(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Chat-completions generation client.
pub struct HttpGenerationClient {
    config: ClientConfig,
    http: Client,
}

impl HttpGenerationClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    pub fn new(config: ClientConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { config, http }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    fn build_wire_request(&self, request: &GenerationRequest) -> WireRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);

        if let Some(instructions) = &request.instructions {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: instructions.clone(),
            });
        }
        if !request.language.is_empty() {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: format!("Reply in {}.", request.language),
            });
        }

        for message in &request.history {
            messages.push(WireMessage {
                role: match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                }
                .to_string(),
                content: message.content.clone(),
            });
        }

        WireRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    async fn send_once(&self, wire: &WireRequest) -> std::result::Result<String, Attempt> {
        let url = format!("{}/v1/chat/completions", self.base_url());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(wire)
            .send()
            .await
            .map_err(|e| Attempt::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Transient(format!("failed to read response: {e}")))?;

        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Attempt::Transient(format!("status {status}: {body}")));
        }
        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<WireError>(&body) {
                return Err(Attempt::Fatal(format!(
                    "{} ({})",
                    error.error.message, status
                )));
            }
            return Err(Attempt::Fatal(format!("status {status}: {body}")));
        }

        let parsed: WireResponse = serde_json::from_str(&body)
            .map_err(|e| Attempt::Fatal(format!("failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Attempt::Fatal("response carried no choices".to_string()))
    }
}

enum Attempt {
    /// Worth retrying: connect failure, timeout, 5xx, 429
    Transient(String),
    /// Not worth retrying: auth failure, malformed request, bad body
    Fatal(String),
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let wire = self.build_wire_request(&request);
        let mut last_transient = String::new();

        for attempt in 0..=self.config.max_retries {
            match self.send_once(&wire).await {
                Ok(text) => return Ok(text.trim().to_string()),
                Err(Attempt::Fatal(message)) => {
                    return Err(Error::generation(PROVIDER, message));
                }
                Err(Attempt::Transient(message)) => {
                    warn!(attempt, %message, "transient generation failure");
                    last_transient = message;
                    if attempt < self.config.max_retries {
                        let backoff = Duration::from_millis(250 * 2u64.pow(attempt));
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Err(Error::unavailable(last_transient))
    }
}

// Wire types for the chat-completions shape.

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Message;

    #[test]
    fn test_wire_request_shape() {
        let client = HttpGenerationClient::new(ClientConfig::new("key", "gpt-4o-mini"));
        let request = GenerationRequest::new()
            .with_instructions("Pick the next worker")
            .with_language("spanish")
            .with_history(vec![Message::user("hola")]);

        let wire = client.build_wire_request(&request);
        assert_eq!(wire.model, "gpt-4o-mini");
        assert_eq!(wire.messages.len(), 3);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[1].content, "Reply in spanish.");
        assert_eq!(wire.messages[2].role, "user");
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("key", "gpt-4o-mini");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_retries, 2);
        assert!(config.base_url.is_none());
    }
}
