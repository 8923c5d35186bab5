//! Completion gateway abstraction.
//!
//! The agent talks to a language model through the [`CompletionGateway`]
//! trait: one request in, one opaque [`RawReply`] out. Transient overload is
//! retried inside the gateway; everything else surfaces as a
//! [`ProviderError`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use planloop_core::types::Message;

pub mod anthropic;
pub mod error;
pub mod retry;
pub mod scripted;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;
pub use retry::RetryPolicy;
pub use scripted::ScriptedProvider;

/// Provider API key. `Debug` never prints the secret.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// A request to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl CompletionRequest {
    /// A request carrying one user message.
    pub fn single_prompt(
        model: impl Into<String>,
        prompt: impl Into<String>,
        max_tokens: u32,
        temperature: Option<f64>,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            max_tokens,
            temperature,
            system: None,
        }
    }
}

/// Raw reply body. Only the response parser looks inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawReply(pub serde_json::Value);

/// The completion gateway contract.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Provider identifier (e.g., "anthropic").
    fn id(&self) -> &str;

    /// Send one request; overload retries happen inside.
    async fn complete(&self, request: &CompletionRequest) -> Result<RawReply, ProviderError>;
}
