//! Shared types for the agent core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mcp_client::{CallContext, RpcResult};

/// Inbound chat turn, as extracted from request headers and body.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub api_key: Option<String>,
    pub role: Option<String>,
    pub profile: Option<String>,
    /// Caller-supplied correlation id, used for log correlation only.
    pub correlation_id: Option<String>,
    pub message: String,
}

impl ChatRequest {
    /// Identity forwarded on RPC calls made for this turn.
    pub fn call_context(&self) -> CallContext {
        CallContext {
            api_key: self.api_key.clone(),
            role: self.role.clone(),
            profile: self.profile.clone(),
        }
    }
}

/// Final chat payload returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

impl ChatReply {
    /// Reply with a freshly generated correlation id.
    pub fn fresh(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Which branch of the turn produced the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPath {
    /// No valid tool call; the baseline answer was used.
    Direct,
    /// The tool ran and the answer was regenerated from its result.
    Executed { method: String },
    /// The tool ran but failed; the fixed apology was returned.
    ExecutionFailed { method: String },
}

/// A completed chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: ChatReply,
    pub path: TurnPath,
}

/// Reply of the generic tool endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolReply {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

impl ToolReply {
    /// Code reported for successful tool calls.
    pub const OK: &'static str = "OK";
}

impl From<RpcResult> for ToolReply {
    fn from(result: RpcResult) -> Self {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        match result {
            RpcResult::Success { data } => Self {
                code: Self::OK.to_string(),
                message: Self::OK.to_string(),
                data: Some(data),
                correlation_id,
            },
            RpcResult::Error { code, message } => Self {
                code,
                message,
                data: None,
                correlation_id,
            },
        }
    }
}

// ─── Health ──────────────────────────────────────────────────────────────────

/// Status of one downstream component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Disabled,
}

/// Probe result for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    #[serde(rename = "checkedAt")]
    pub checked_at: DateTime<Utc>,
    pub components: HealthComponents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthComponents {
    pub llm: ComponentHealth,
    pub rpc: ComponentHealth,
}

impl HealthReport {
    /// Overall status is `down` if any enabled component is down.
    pub fn new(llm: ComponentHealth, rpc: ComponentHealth) -> Self {
        let status = if llm.status == HealthStatus::Down || rpc.status == HealthStatus::Down {
            HealthStatus::Down
        } else {
            HealthStatus::Up
        };
        Self {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checked_at: Utc::now(),
            components: HealthComponents { llm, rpc },
        }
    }
}
