//! Tool implementations the agent can select.
//!
//! Each tool implements the [`Tool`] trait and is looked up by id in a
//! [`ToolRegistry`]. `final_answer` is listed in the catalog so the model can
//! choose it, but the agent intercepts that choice; it is never invoked here.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use planloop_core::config::Config;

pub mod music;
pub mod upload;
pub mod web_fetch;

pub use music::PlayMusicTool;
pub use upload::UploadTextFileTool;
pub use web_fetch::GetHtmlContentsTool;

/// Id of the pseudo-tool that ends the loop.
pub const FINAL_ANSWER: &str = "final_answer";

const FINAL_ANSWER_DESCRIPTION: &str = "Provide the final response to the user.";
const FINAL_ANSWER_INSTRUCTIONS: &str = r#"Required payload: {"answer": "Your final answer"}. Response format: A direct response to the user."#;

/// Context provided to tools during execution.
#[derive(Clone, Default)]
pub struct ToolContext {
    pub config: Arc<Config>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

/// Output from a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Id the model uses to select the tool (e.g. "get_html_contents").
    fn name(&self) -> &str;

    /// One-line description shown in the catalog.
    fn description(&self) -> &str;

    /// Payload shape the model must produce in the describe stage.
    fn instructions(&self) -> &str;

    async fn execute(
        &self,
        payload: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput>;
}

/// A catalog row as rendered into prompts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub description: String,
    pub instructions: String,
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tools.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        register_builtin_tools(&mut registry);
        registry
    }

    /// Register a tool. On duplicate ids the first registration wins.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, id: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == id).map(|t| t.as_ref())
    }

    /// Ids of the invocable tools, in registration order.
    /// Whether `id` may be chosen in the decide stage.
    pub fn is_known(&self, id: &str) -> bool {
        id == FINAL_ANSWER || self.get(id).is_some()
    }

    pub fn describe(&self, id: &str) -> Option<&str> {
        if id == FINAL_ANSWER {
            return Some(FINAL_ANSWER_DESCRIPTION);
        }
        self.get(id).map(|t| t.description())
    }

    pub fn instructions(&self, id: &str) -> Option<&str> {
        if id == FINAL_ANSWER {
            return Some(FINAL_ANSWER_INSTRUCTIONS);
        }
        self.get(id).map(|t| t.instructions())
    }

    /// Every selectable tool, `final_answer` last.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.tools
            .iter()
            .map(|t| CatalogEntry {
                id: t.name().to_string(),
                description: t.description().to_string(),
                instructions: t.instructions().to_string(),
            })
            .chain(std::iter::once(CatalogEntry {
                id: FINAL_ANSWER.to_string(),
                description: FINAL_ANSWER_DESCRIPTION.to_string(),
                instructions: FINAL_ANSWER_INSTRUCTIONS.to_string(),
            }))
            .collect()
    }

    /// Run the tool `id`. Never fails: implementation errors and unknown ids
    /// come back as result text so the run can continue.
    pub async fn invoke(
        &self,
        id: &str,
        payload: serde_json::Value,
        context: &ToolContext,
    ) -> ToolOutput {
        if id == FINAL_ANSWER {
            return ToolOutput::error("final_answer is answered by the agent, not invoked as a tool");
        }

        let Some(tool) = self.get(id) else {
            warn!(tool = %id, "No tool registered under this id");
            return ToolOutput::error(format!("Tool '{id}' execution not defined."));
        };

        info!(tool = %id, "Executing tool");
        match tool.execute(payload, context).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %id, error = %e, "Tool execution failed");
                ToolOutput::error(format!("Tool '{id}' failed: {e}"))
            }
        }
    }
}

/// Register the built-in tools: `get_html_contents`, `upload_text_file`,
/// `play_music`.
pub fn register_builtin_tools(registry: &mut ToolRegistry) {
    registry.register(Box::new(GetHtmlContentsTool));
    registry.register(Box::new(UploadTextFileTool));
    registry.register(Box::new(PlayMusicTool));
}

/// Build the shared HTTP client for tool calls, honouring the configured timeout.
pub(crate) fn http_client(context: &ToolContext) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(
            context.config.tool_timeout_ms(),
        ))
        .build()?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the payload back."
        }

        fn instructions(&self) -> &str {
            r#"Required payload: {"text": "..."}"#
        }

        async fn execute(
            &self,
            payload: serde_json::Value,
            _context: &ToolContext,
        ) -> anyhow::Result<ToolOutput> {
            let text = payload
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("missing 'text' field"))?;
            Ok(ToolOutput::text(text))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry
    }

    #[test]
    fn test_builtin_registry_ids() {
        let registry = ToolRegistry::builtin();
        for id in ["get_html_contents", "upload_text_file", "play_music", FINAL_ANSWER] {
            assert!(registry.is_known(id), "{id}");
        }
        assert!(!registry.is_known("game_submit_form"));
    }

    #[test]
    fn test_catalog_ends_with_final_answer() {
        let catalog = ToolRegistry::builtin().catalog();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.last().unwrap().id, FINAL_ANSWER);
        assert!(catalog[0].instructions.contains(r#""url""#));
    }

    #[test]
    fn test_describe_and_instructions() {
        let registry = registry();
        assert_eq!(registry.describe("echo"), Some("Echo the payload back."));
        assert_eq!(
            registry.describe(FINAL_ANSWER),
            Some("Provide the final response to the user.")
        );
        assert!(registry.instructions(FINAL_ANSWER).unwrap().contains("answer"));
        assert_eq!(registry.describe("missing"), None);
        assert_eq!(registry.instructions("missing"), None);
    }

    #[tokio::test]
    async fn test_invoke_known_tool() {
        let out = registry()
            .invoke("echo", json!({"text": "hi"}), &ToolContext::default())
            .await;
        assert_eq!(out, ToolOutput::text("hi"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool_fallback() {
        let out = registry()
            .invoke("teleport", json!({}), &ToolContext::default())
            .await;
        assert_eq!(out.content, "Tool 'teleport' execution not defined.");
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn test_invoke_failure_becomes_error_output() {
        let out = registry()
            .invoke("echo", json!({}), &ToolContext::default())
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("missing 'text' field"));
    }

    #[tokio::test]
    async fn test_final_answer_is_not_invoked() {
        let out = registry()
            .invoke(FINAL_ANSWER, json!({"answer": "x"}), &ToolContext::default())
            .await;
        assert!(out.is_error);
    }
}
