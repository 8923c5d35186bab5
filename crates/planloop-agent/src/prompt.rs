//! Stage prompt builders.
//!
//! Every builder is a pure function of the state and the tool registry: the
//! same inputs always render the same text.

use planloop_core::error::{PlanloopError, Result};
use planloop_core::types::Stage;
use planloop_tools::ToolRegistry;

use crate::state::{Action, AgentState};

/// Tool catalog as `- id: description` lines.
fn render_catalog(tools: &ToolRegistry) -> String {
    tools
        .catalog()
        .iter()
        .map(|e| format!("- {}: {}", e.id, e.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tool catalog with each tool's payload instructions.
fn render_catalog_with_instructions(tools: &ToolRegistry) -> String {
    tools
        .catalog()
        .iter()
        .map(|e| format!("- {}: {}\n  {}", e.id, e.description, e.instructions))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_actions(actions: &[Action]) -> String {
    if actions.is_empty() {
        return "No actions taken yet.".to_string();
    }
    actions
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let reflection = if a.reflection.is_empty() {
                "(none yet)"
            } else {
                a.reflection.as_str()
            };
            let status = if a.is_error { " (failed)" } else { "" };
            format!(
                "Action {n}: {tool}{status}\nPayload: {payload}\nResult: {result}\nReflection: {reflection}",
                n = i + 1,
                tool = a.tool_id,
                payload = a.payload,
                result = a.result,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn plan_or<'a>(state: &'a AgentState, fallback: &'a str) -> &'a str {
    if state.plan.is_empty() {
        fallback
    } else {
        &state.plan
    }
}

pub fn plan_prompt(state: &AgentState, tools: &ToolRegistry) -> String {
    format!(
        r#"<main_objective>
Analyze the user's query and decide whether to answer it immediately or develop a detailed plan.
</main_objective>

<rules>
- If the query is straightforward (e.g. "How far is the Moon from Earth?"), address it directly.
- If the query requires multiple steps, use the available tools to create an actionable plan.
- Respond clearly and avoid unnecessary complexity.
</rules>

<user_query>
{query}
</user_query>

<available_tools>
{catalog}
</available_tools>
"#,
        query = state.user_query(),
        catalog = render_catalog_with_instructions(tools),
    )
}

pub fn decide_prompt(state: &AgentState, tools: &ToolRegistry) -> String {
    format!(
        r#"<main_objective>
Determine the next step for the user's query and current context. Either select the tool to use next or decide to give the final answer.
</main_objective>

<rules>
- Respond with JSON only, naming exactly one tool from the available tools.
- If the question is straightforward, move directly to final_answer.
- The JSON structure must be:
  {{
    "_thoughts": "Your internal reasoning",
    "tool": "precise name of the tool"
  }}
</rules>

<user_query>
{query}
</user_query>

<available_tools>
{catalog}
</available_tools>

<current_plan>
Plan: {plan}
</current_plan>

<actions_taken>
{actions}
</actions_taken>
"#,
        query = state.user_query(),
        catalog = render_catalog(tools),
        plan = plan_or(state, "No plan yet."),
        actions = render_actions(&state.actions_taken),
    )
}

/// Fails when no tool has been selected.
pub fn describe_prompt(state: &AgentState, _tools: &ToolRegistry) -> Result<String> {
    let tool = state.active_tool.as_ref().ok_or_else(|| PlanloopError::State {
        stage: Stage::Describe,
        detail: "active tool is not defined".into(),
    })?;

    Ok(format!(
        r#"<main_objective>
Provide the payload needed to execute the tool "{id}" given the current state.
</main_objective>

<rules>
- Respond with a single JSON object and nothing else.
</rules>

<tool_details>
Tool Name: {id}
Tool Instructions: {instruction}
</tool_details>

<actions_taken>
{actions}
</actions_taken>
"#,
        id = tool.tool_id,
        instruction = tool.instruction,
        actions = render_actions(&state.actions_taken),
    ))
}

pub fn reflect_prompt(state: &AgentState, _tools: &ToolRegistry) -> String {
    format!(
        r#"<main_objective>
Reflect on the most recent action and suggest improvements or adjustments to the plan if needed.
</main_objective>

<actions_taken>
{actions}
</actions_taken>
"#,
        actions = render_actions(&state.actions_taken),
    )
}

pub fn final_prompt(state: &AgentState, _tools: &ToolRegistry) -> String {
    format!(
        r#"<main_objective>
Provide the final answer to the user's query: "{query}".
</main_objective>

<rules>
- Answer the user's question directly, clearly and actionably.
- If the query is unclear, ask for clarification.
- Summarize the key findings.
</rules>

<current_plan>
{plan}
</current_plan>

<actions_taken>
{actions}
</actions_taken>
"#,
        query = state.user_query(),
        plan = plan_or(state, "No plan created."),
        actions = render_actions(&state.actions_taken),
    )
}
