//! Anthropic Messages API provider.
//!
//! Non-streaming `POST /v1/messages`. HTTP 529 means the API is overloaded
//! and the call is retried per the configured [`RetryPolicy`].

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use planloop_core::config::Config;
use planloop_core::types::Message;

use crate::retry::retry_transient;
use crate::{ApiKey, CompletionGateway, CompletionRequest, ProviderError, RawReply, RetryPolicy};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    pub base_url: String,
    api_key: ApiKey,
    retry: RetryPolicy,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

impl AnthropicProvider {
    pub fn new(api_key: ApiKey, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build from config. A missing API key is a configuration error.
    pub fn from_config(config: &Config) -> planloop_core::error::Result<Self> {
        let api_key = ApiKey::new(config.require_api_key()?);
        Ok(
            Self::new(api_key, config.provider_base_url().as_deref())
                .with_retry(RetryPolicy::from_config(config)),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn send_once(&self, body: &MessagesRequest<'_>) -> Result<RawReply, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidBody(e.to_string()))?;
        Ok(RawReply(value))
    }
}

#[async_trait]
impl CompletionGateway for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<RawReply, ProviderError> {
        let body = MessagesRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
        };

        let body = &body;
        retry_transient(&self.retry, move |attempt| {
            debug!(model = %body.model, attempt, base_url = %self.base_url, "Calling Anthropic Messages API");
            self.send_once(body)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_anthropic_provider_creation() {
        let provider = AnthropicProvider::new(ApiKey::new("sk"), None);
        assert_eq!(provider.id(), "anthropic");
        assert_eq!(provider.base_url, ANTHROPIC_BASE_URL);
        assert_eq!(provider.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_custom_base_url() {
        let provider =
            AnthropicProvider::new(ApiKey::new("sk"), Some("https://proxy.example.com/"));
        assert_eq!(provider.base_url, "https://proxy.example.com");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = Config {
            provider: Some(planloop_core::config::ProviderConfig {
                api_key_env: Some("PL_TEST_NO_SUCH_KEY".into()),
                ..Default::default()
            }),
            ..Config::default()
        };
        let err = AnthropicProvider::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_from_config_applies_retry_settings() {
        let config = Config {
            provider: Some(planloop_core::config::ProviderConfig {
                api_key: Some("sk-direct".into()),
                max_attempts: Some(5),
                retry_delay_ms: Some(250),
                ..Default::default()
            }),
            ..Config::default()
        };
        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(
            provider.retry_policy(),
            RetryPolicy::new(5, Duration::from_millis(250))
        );
    }

    #[test]
    fn test_messages_request_serialization() {
        let messages = vec![Message::user("hello")];
        let body = MessagesRequest {
            model: "claude-3-5-sonnet-20241022",
            messages: &messages,
            max_tokens: 1000,
            temperature: Some(0.7),
            system: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["temperature"], 0.7);
        assert!(json.get("system").is_none());
    }
}
