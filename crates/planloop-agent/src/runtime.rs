//! Agent state machine: plan, decide, describe, execute, reflect, repeat.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use planloop_core::config::Config;
use planloop_core::error::{PlanloopError, Result};
use planloop_core::types::{Message, Stage};
use planloop_providers::{CompletionGateway, CompletionRequest};
use planloop_tools::{FINAL_ANSWER, ToolContext, ToolRegistry};

use crate::audit::{AuditRecord, AuditSink, NoAudit};
use crate::prompt;
use crate::response::{self, Decision};
use crate::state::{ActiveTool, AgentState};

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub answer: String,
    /// The step budget ran out before the model chose `final_answer`.
    pub truncated: bool,
    pub steps: u32,
    pub duration_ms: u64,
    pub state: AgentState,
}

/// Model settings applied to every stage request.
#[derive(Debug, Clone)]
struct ModelSettings {
    model: String,
    max_tokens: u32,
    temperature: Option<f64>,
}

/// Drives runs. Holds only shared, immutable collaborators; every run owns
/// its own [`AgentState`].
pub struct AgentRuntime {
    provider: Arc<dyn CompletionGateway>,
    tools: Arc<ToolRegistry>,
    audit: Arc<dyn AuditSink>,
    tool_context: ToolContext,
    settings: ModelSettings,
    max_steps: u32,
}

impl AgentRuntime {
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn CompletionGateway>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            tools,
            audit: Arc::new(NoAudit),
            settings: ModelSettings {
                model: config.model(),
                max_tokens: config.max_tokens(),
                temperature: config.temperature(),
            },
            max_steps: config.max_steps(),
            tool_context: ToolContext::new(config),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Answer `query`. Any stage failure aborts this run only.
    pub async fn run(&self, query: &str) -> Result<RunOutcome> {
        let mut state = AgentState::new(query, self.max_steps);
        let run_id = state.run_id;
        let span = info_span!("agent_run", %run_id);

        async move {
            let start = Instant::now();
            let started_at = Utc::now();
            info!(max_steps = self.max_steps, "Agent run started");

            let result = self.drive(&mut state).await;

            let duration_ms = start.elapsed().as_millis() as u64;
            match result {
                Ok((answer, truncated)) => {
                    info!(
                        steps = state.steps_run(),
                        actions = state.actions_taken.len(),
                        truncated,
                        duration_ms,
                        "Agent run finished"
                    );
                    Ok(RunOutcome {
                        run_id,
                        started_at,
                        answer,
                        truncated,
                        steps: state.steps_run(),
                        duration_ms,
                        state,
                    })
                }
                Err(e) => {
                    error!(
                        stage = ?e.stage(),
                        kind = e.kind(),
                        error = %e,
                        duration_ms,
                        "Agent run failed"
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// The stage loop. Returns the final answer and whether the budget ran out.
    async fn drive(&self, state: &mut AgentState) -> Result<(String, bool)> {
        let truncated = loop {
            if state.budget_exhausted() {
                warn!(max_steps = state.max_steps, "Step budget exhausted, forcing final answer");
                break true;
            }

            self.plan(state).await?;
            let decision = self.decide(state).await?;
            if decision.tool == FINAL_ANSWER {
                break false;
            }

            self.describe(state).await?;
            self.execute(state).await?;
            self.reflect(state).await?;
            state.step += 1;
        };

        let answer = self.final_answer(state).await?;
        Ok((answer, truncated))
    }

    /// One round trip to the gateway with the current `system_prompt`.
    async fn ask(&self, state: &AgentState) -> Result<String> {
        let stage = state.stage;
        let request = CompletionRequest::single_prompt(
            &self.settings.model,
            &state.system_prompt,
            self.settings.max_tokens,
            self.settings.temperature,
        );
        debug!(%stage, prompt = %state.system_prompt, "Sending stage prompt");

        let reply = self
            .provider
            .complete(&request)
            .await
            .map_err(|e| PlanloopError::Completion {
                stage,
                source: anyhow::Error::new(e),
            })?;
        debug!(%stage, reply = %reply.0, "Received raw reply");

        response::reply_text(&reply, stage)
    }

    fn enter(&self, state: &mut AgentState, stage: Stage) -> Instant {
        state.stage = stage;
        debug!(%stage, step = state.step, "Stage started");
        Instant::now()
    }

    fn finish(&self, state: &AgentState, started: Instant) {
        info!(
            stage = %state.stage,
            step = state.step,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage finished"
        );
    }

    /// Audit failures are logged and never abort the run.
    async fn log_stage(&self, state: &AgentState, header: &str, prompt: String, content: String) {
        let record = AuditRecord {
            run_id: state.run_id,
            stage: state.stage,
            step: state.step,
            header: header.to_string(),
            prompt,
            content,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.audit.record(&record).await {
            warn!(stage = %state.stage, error = %e, "Failed to write audit record");
        }
    }

    async fn plan(&self, state: &mut AgentState) -> Result<()> {
        let started = self.enter(state, Stage::Plan);
        state.system_prompt = prompt::plan_prompt(state, &self.tools);
        state.plan = self.ask(state).await?;

        self.log_stage(
            state,
            "Planning",
            state.system_prompt.clone(),
            format!("Current plan: {}", state.plan),
        )
        .await;
        self.finish(state, started);
        Ok(())
    }

    async fn decide(&self, state: &mut AgentState) -> Result<Decision> {
        let started = self.enter(state, Stage::Decide);
        state.system_prompt = prompt::decide_prompt(state, &self.tools);
        let text = self.ask(state).await?;
        let decision = response::decode_decision(&text)?;

        if !self.tools.is_known(&decision.tool) {
            return Err(PlanloopError::Decode {
                stage: Stage::Decide,
                detail: format!("unknown tool '{}'", decision.tool),
            });
        }

        info!(tool = %decision.tool, step = state.step, "Tool selected");
        state.active_tool = Some(ActiveTool {
            tool_id: decision.tool.clone(),
            description: self.tools.describe(&decision.tool).unwrap_or_default().to_string(),
            instruction: self.tools.instructions(&decision.tool).unwrap_or_default().to_string(),
        });

        let next_move = serde_json::to_string(&decision)?;
        self.log_stage(
            state,
            "Decision",
            state.system_prompt.clone(),
            format!("Next move: {next_move}"),
        )
        .await;
        self.finish(state, started);
        Ok(decision)
    }

    async fn describe(&self, state: &mut AgentState) -> Result<()> {
        let started = self.enter(state, Stage::Describe);
        state.system_prompt = prompt::describe_prompt(state, &self.tools)?;
        let text = self.ask(state).await?;
        let payload = response::decode_payload(&text)?;

        let description = format!("Next step description: {payload}");
        state.active_tool_payload = Some(payload);

        self.log_stage(state, "Description", state.system_prompt.clone(), description)
            .await;
        self.finish(state, started);
        Ok(())
    }

    async fn execute(&self, state: &mut AgentState) -> Result<()> {
        let started = self.enter(state, Stage::Execute);
        let tool_id = state.active_tool()?.tool_id.clone();
        let payload = state
            .active_tool_payload
            .take()
            .ok_or_else(|| PlanloopError::State {
                stage: Stage::Execute,
                detail: format!("no payload described for '{tool_id}'"),
            })?;

        let output = self
            .tools
            .invoke(&tool_id, payload.clone(), &self.tool_context)
            .await;
        if output.is_error {
            warn!(tool = %tool_id, result = %output.content, "Tool reported an error");
        }

        let result_json = serde_json::to_string(&output.content)?;
        state.record_action(&tool_id, payload, output.content, output.is_error);

        self.log_stage(
            state,
            "Execution",
            String::new(),
            format!("Action result: {result_json}"),
        )
        .await;
        self.finish(state, started);
        Ok(())
    }

    async fn reflect(&self, state: &mut AgentState) -> Result<()> {
        let started = self.enter(state, Stage::Reflect);
        state.system_prompt = prompt::reflect_prompt(state, &self.tools);
        let reflection = self.ask(state).await?;
        state.reflect_on_last(reflection.clone())?;

        self.log_stage(state, "Reflection", state.system_prompt.clone(), reflection)
            .await;
        self.finish(state, started);
        Ok(())
    }

    async fn final_answer(&self, state: &mut AgentState) -> Result<String> {
        let started = self.enter(state, Stage::Final);
        state.system_prompt = prompt::final_prompt(state, &self.tools);
        let answer = self.ask(state).await?;
        state.messages.push(Message::assistant(answer.clone()));

        self.log_stage(
            state,
            "Final Answer",
            state.system_prompt.clone(),
            serde_json::to_string(&answer)?,
        )
        .await;
        self.finish(state, started);
        Ok(answer)
    }
}
