//! play_music tool: forwards a Spotify-shaped JSON payload to the music
//! service.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{Tool, ToolContext, ToolOutput, http_client};

pub struct PlayMusicTool;

const DEFAULT_REPLY: &str = "Music playback response received";

/// The service's `data` field, rendered as text.
fn reply_text(reply: &serde_json::Value) -> String {
    match reply.get("data") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => DEFAULT_REPLY.to_string(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl Tool for PlayMusicTool {
    fn name(&self) -> &str {
        "play_music"
    }

    fn description(&self) -> &str {
        "Generate Spotify API JSON for playing or managing music."
    }

    fn instructions(&self) -> &str {
        "Required payload: JSON object with Spotify API details for actions like search, play, or playlist creation."
    }

    async fn execute(
        &self,
        payload: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        if !payload.is_object() {
            anyhow::bail!("play_music payload must be a JSON object");
        }

        let Some(url) = context.config.tools_config().resolve_music_url() else {
            return Ok(ToolOutput::error(
                "ERROR: MUSIC_URL environment variable is missing.",
            ));
        };

        debug!(url = %url, "play_music");

        let client = http_client(context)?;
        let resp = match client.post(&url).json(&payload).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "Music request failed");
                return Ok(ToolOutput::error("Failed to play music"));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            return Ok(ToolOutput::error(format!("Music service returned HTTP {status}")));
        }

        let reply: serde_json::Value = resp.json().await?;
        Ok(ToolOutput::text(reply_text(&reply)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use planloop_core::config::{Config, ToolsConfig};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_reply_text_shapes() {
        assert_eq!(reply_text(&json!({"data": "Playing"})), "Playing");
        assert_eq!(reply_text(&json!({"status": "ok"})), DEFAULT_REPLY);
        assert_eq!(reply_text(&json!({"data": null})), DEFAULT_REPLY);
        assert_eq!(reply_text(&json!({"data": {"track": 1}})), r#"{"track":1}"#);
    }

    #[tokio::test]
    async fn test_missing_music_url() {
        let config = Config {
            tools: Some(ToolsConfig {
                music_url_env: Some("PL_TEST_NO_MUSIC_URL".into()),
                ..Default::default()
            }),
            ..Config::default()
        };
        let out = PlayMusicTool
            .execute(json!({"action": "play"}), &ToolContext::new(Arc::new(config)))
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("MUSIC_URL"));
    }

    #[tokio::test]
    async fn test_non_object_payload_rejected() {
        let result = PlayMusicTool
            .execute(json!("play something"), &ToolContext::default())
            .await;
        assert!(result.is_err());
    }
}
