//! Tool-planning prompts and output parser.
//!
//! The planner is asked for a single strict JSON object:
//! `{"mcpCall":{"method":"<name>","params":{...}}}`. A bare
//! `{"method":...,"params":...}` object is also accepted, and JSON wrapped
//! in markdown fences or surrounding prose is extracted first.
//!
//! Anything else is `NotParsed`, which the orchestrator treats as "no tool
//! call requested".

use serde_json::{Map, Value};

use crate::mcp_client::ToolCall;

/// Result of parsing planner output.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Parsed(ToolCall),
    NotParsed,
}

// ─── Prompts ─────────────────────────────────────────────────────────────────

/// Planning prompt: the user message followed by the tool catalog.
pub fn build_planning_prompt(message: &str, tools_json: &str) -> String {
    format!(
        "{message}\n\nAvailable tools (JSON):\n{tools_json}\n\n\
         Return strictly JSON of the form {{\"mcpCall\":{{\"method\":<string>,\"params\":<object>}}}}. \
         Do not include any other text."
    )
}

/// Regeneration prompt: the user message followed by the tool result.
pub fn build_regeneration_prompt(message: &str, result_json: &str) -> String {
    format!("{message}\n\nTool result (JSON):\n{result_json}")
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Parse planner output into a candidate tool call.
pub fn parse_plan(text: &str) -> PlanOutcome {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return PlanOutcome::NotParsed;
    }

    let Ok(Value::Object(root)) = serde_json::from_str::<Value>(extract_json(trimmed)) else {
        return PlanOutcome::NotParsed;
    };

    let call = match root.get("mcpCall") {
        Some(Value::Object(inner)) => tool_call_from(inner),
        Some(_) => None,
        None => tool_call_from(&root),
    };

    match call {
        Some(call) => PlanOutcome::Parsed(call),
        None => PlanOutcome::NotParsed,
    }
}

fn tool_call_from(obj: &Map<String, Value>) -> Option<ToolCall> {
    let method = obj.get("method")?.as_str()?.trim();
    if method.is_empty() {
        return None;
    }
    let params = match obj.get("params") {
        Some(Value::Object(params)) => params.clone(),
        _ => Map::new(),
    };
    Some(ToolCall {
        method: method.to_string(),
        params,
    })
}

/// Extract JSON from text that may be wrapped in markdown code fences.
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end > start {
                return &text[start..=end];
            }
        }
    }
    text
}

// ─── Tests ───────────────────────────────────────────────────────────────────
