//! Reply parsing: text extraction from raw gateway replies and decoding of
//! the structured decide/describe results.

use serde::{Deserialize, Serialize};

use planloop_core::error::{PlanloopError, Result};
use planloop_core::types::Stage;
use planloop_providers::RawReply;

/// Output of the decide stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "_thoughts", default)]
    pub thoughts: String,
    pub tool: String,
}

/// Pull the text out of a reply: `completion` first, then `content[0].text`.
pub fn reply_text(reply: &RawReply, stage: Stage) -> Result<String> {
    let value = &reply.0;

    let text = value
        .get("completion")
        .and_then(|c| c.as_str())
        .or_else(|| {
            value
                .get("content")
                .and_then(|c| c.get(0))
                .and_then(|block| block.get("text"))
                .and_then(|t| t.as_str())
        });

    match text {
        Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
        Some(_) => Err(PlanloopError::Parse {
            stage,
            detail: "reply text is empty".into(),
        }),
        None => Err(PlanloopError::Parse {
            stage,
            detail: "reply has neither `completion` nor `content[0].text`".into(),
        }),
    }
}

/// Strip a surrounding markdown code fence, with or without a language tag.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse `text` as a JSON object. Only a surrounding code fence is removed;
/// anything else around the object is a decode failure.
fn parse_object(text: &str) -> std::result::Result<serde_json::Value, String> {
    match serde_json::from_str::<serde_json::Value>(strip_code_fence(text)) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(e.to_string()),
    }
}

pub fn decode_decision(text: &str) -> Result<Decision> {
    let value = parse_object(text).map_err(|detail| PlanloopError::Decode {
        stage: Stage::Decide,
        detail,
    })?;
    let decision: Decision =
        serde_json::from_value(value).map_err(|e| PlanloopError::Decode {
            stage: Stage::Decide,
            detail: e.to_string(),
        })?;
    if decision.tool.trim().is_empty() {
        return Err(PlanloopError::Decode {
            stage: Stage::Decide,
            detail: "`tool` is empty".into(),
        });
    }
    Ok(decision)
}

/// The describe stage's tool payload. Must be a JSON object.
pub fn decode_payload(text: &str) -> Result<serde_json::Value> {
    parse_object(text).map_err(|detail| PlanloopError::Decode {
        stage: Stage::Describe,
        detail,
    })
}
