//! Scripted provider that replays canned replies in order.
//!
//! Used by tests and offline runs; every request is recorded so callers can
//! inspect the prompts that were sent.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::{CompletionGateway, CompletionRequest, ProviderError, RawReply};

#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<RawReply, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a Messages-API-shaped reply carrying `text`.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn with_reply(self, reply: serde_json::Value) -> Self {
        self.push(Ok(RawReply(reply)));
        self
    }

    pub fn with_error(self, error: ProviderError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.push(Ok(RawReply(json!({
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "text", "text": text }],
        }))));
    }

    fn push(&self, reply: Result<RawReply, ProviderError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionGateway for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<RawReply, ProviderError> {
        let seen = match self.requests.lock() {
            Ok(mut requests) => {
                requests.push(request.clone());
                requests.len()
            }
            Err(_) => 0,
        };
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        next.unwrap_or(Err(ProviderError::Exhausted(seen)))
    }
}
