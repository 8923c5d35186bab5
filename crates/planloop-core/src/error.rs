use thiserror::Error;

use crate::types::Stage;

#[derive(Debug, Error)]
pub enum PlanloopError {
    #[error("Config error: {0}")]
    Config(String),

    /// The completion gateway failed after exhausting its retries.
    #[error("Completion failed during {stage}: {source}")]
    Completion {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    /// The reply had none of the recognised shapes.
    #[error("Error parsing API response for step {stage}: {detail}")]
    Parse { stage: Stage, detail: String },

    /// The reply text was not the structured result the stage expects.
    #[error("Error decoding {stage} output: {detail}")]
    Decode { stage: Stage, detail: String },

    /// A stage ran without its precondition.
    #[error("Inconsistent agent state during {stage}: {detail}")]
    State { stage: Stage, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlanloopError {
    /// Stage the error originated in, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PlanloopError::Completion { stage, .. }
            | PlanloopError::Parse { stage, .. }
            | PlanloopError::Decode { stage, .. }
            | PlanloopError::State { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Short machine-readable label for error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanloopError::Config(_) => "config",
            PlanloopError::Completion { .. } => "completion",
            PlanloopError::Parse { .. } => "parse",
            PlanloopError::Decode { .. } => "decode",
            PlanloopError::State { .. } => "state",
            PlanloopError::Io(_) => "io",
            PlanloopError::Json(_) => "json",
            PlanloopError::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanloopError>;
