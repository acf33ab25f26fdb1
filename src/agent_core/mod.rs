//! Agent Core: the chat turn between the inbound API and the backends.
//!
//! Submodules:
//! - `admission`: Per-credential fixed-window rate limiting
//! - `orchestrator`: Baseline, plan, validate, execute, regenerate
//! - `plan_parser`: Planning prompts and the tool-call output parser
//! - `prompts`: Role/profile prompt resolution and rendering
//! - `sanitize`: Prompt-echo stripping and keyword line redaction
//! - `types`: Shared request/reply types
//! - `errors`: Agent-level error types and wire codes

pub mod admission;
pub mod errors;
pub mod orchestrator;
pub mod plan_parser;
pub mod prompts;
pub mod sanitize;
pub mod types;

// Re-exports for convenience
pub use admission::{Admission, AdmissionController};
pub use errors::AgentError;
pub use orchestrator::Orchestrator;
pub use prompts::PromptCatalog;
pub use types::{ChatReply, ChatRequest, HealthReport, ToolReply, TurnOutcome, TurnPath};
