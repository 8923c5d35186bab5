//! Per-run agent state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use planloop_core::error::{PlanloopError, Result};
use planloop_core::types::{Message, Role, Stage};

const NO_QUERY: &str = "No specific query provided.";

/// The tool chosen by the decide stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTool {
    pub tool_id: String,
    pub description: String,
    pub instruction: String,
}

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub tool_id: String,
    pub payload: serde_json::Value,
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
    /// Empty until the reflect stage of the same step fills it.
    pub reflection: String,
}

/// Everything a run accumulates. Owned by exactly one run and threaded
/// through the stages by `&mut`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub run_id: Uuid,
    pub stage: Stage,
    pub step: u32,
    pub max_steps: u32,
    pub messages: Vec<Message>,
    pub system_prompt: String,
    pub plan: String,
    pub active_tool: Option<ActiveTool>,
    pub active_tool_payload: Option<serde_json::Value>,
    pub actions_taken: Vec<Action>,
}

impl AgentState {
    pub fn new(query: impl Into<String>, max_steps: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stage: Stage::Init,
            step: 1,
            max_steps,
            messages: vec![Message::user(query)],
            system_prompt: String::new(),
            plan: String::new(),
            active_tool: None,
            active_tool_payload: None,
            actions_taken: Vec::new(),
        }
    }

    /// The first user message.
    pub fn user_query(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or(NO_QUERY)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.step > self.max_steps
    }

    /// Steps actually run, never more than the budget.
    pub fn steps_run(&self) -> u32 {
        self.step.min(self.max_steps)
    }

    pub fn active_tool(&self) -> Result<&ActiveTool> {
        self.active_tool.as_ref().ok_or_else(|| PlanloopError::State {
            stage: self.stage,
            detail: "no active tool selected".into(),
        })
    }

    /// Append the result of an execute stage. The reflection starts empty.
    pub fn record_action(
        &mut self,
        tool_id: impl Into<String>,
        payload: serde_json::Value,
        result: impl Into<String>,
        is_error: bool,
    ) {
        self.actions_taken.push(Action {
            tool_id: tool_id.into(),
            payload,
            result: result.into(),
            is_error,
            reflection: String::new(),
        });
    }

    /// Fill the reflection of the most recent action. Earlier actions are
    /// never touched.
    pub fn reflect_on_last(&mut self, reflection: impl Into<String>) -> Result<()> {
        let stage = self.stage;
        let last = self
            .actions_taken
            .last_mut()
            .ok_or_else(|| PlanloopError::State {
                stage,
                detail: "no action to reflect on".into(),
            })?;
        last.reflection = reflection.into();
        Ok(())
    }
}
