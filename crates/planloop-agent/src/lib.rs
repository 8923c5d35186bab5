//! Agent runtime: a single-agent plan/decide/describe/execute/reflect loop.
//!
//! [`AgentRuntime::run`] seeds an [`AgentState`] with the user query and
//! drives it through the stages, one gateway round trip per stage, until the
//! model selects `final_answer` or the step budget runs out. Each stage is
//! recorded through an [`AuditSink`].

pub mod audit;
pub mod prompt;
pub mod response;
pub mod runtime;
pub mod state;

pub use audit::{AuditRecord, AuditSink, MarkdownAuditLog, MemoryAuditLog, NoAudit};
pub use response::Decision;
pub use runtime::{AgentRuntime, RunOutcome};
pub use state::{Action, ActiveTool, AgentState};
