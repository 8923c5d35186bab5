//! Gateway shared state.

use std::sync::Arc;

use tracing::info;

use planloop_agent::{AgentRuntime, AuditSink, MarkdownAuditLog, NoAudit};
use planloop_core::config::Config;
use planloop_core::error::Result;
use planloop_providers::{AnthropicProvider, CompletionGateway};
use planloop_tools::ToolRegistry;

/// Immutable collaborators shared by every request. Each request builds its
/// own run, so nothing here is mutated after startup.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn CompletionGateway>,
    pub tools: Arc<ToolRegistry>,
    pub audit: Arc<dyn AuditSink>,
}

impl GatewayState {
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn CompletionGateway>,
        tools: Arc<ToolRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            provider,
            tools,
            audit,
        }
    }

    /// Wire up the Anthropic provider, the built-in tools and the configured
    /// audit log. Fails when no API key is configured.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let provider = AnthropicProvider::from_config(&config)?;
        let audit = audit_sink(&config);
        Ok(Self::new(
            config,
            Arc::new(provider),
            Arc::new(ToolRegistry::builtin()),
            audit,
        ))
    }

    pub fn runtime(&self) -> AgentRuntime {
        AgentRuntime::new(
            self.config.clone(),
            self.provider.clone(),
            self.tools.clone(),
        )
        .with_audit(self.audit.clone())
    }
}

/// Markdown audit log at the configured path, or a no-op sink when disabled.
pub fn audit_sink(config: &Config) -> Arc<dyn AuditSink> {
    match config.audit_path() {
        Some(path) => {
            info!(path = %path.display(), "Audit trail enabled");
            Arc::new(MarkdownAuditLog::new(path))
        }
        None => Arc::new(NoAudit),
    }
}
