//! Shared types for the RPC client.
//!
//! JSON-RPC 2.0 envelope, call results, session state, and tool catalog
//! structures.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Code attached to every downstream failure surfaced to callers.
pub const BACKEND_ERROR_CODE: &str = "MW005";

/// Message used when the backend answered with nothing usable.
pub const EMPTY_RESPONSE_MESSAGE: &str = "empty response";

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request envelope. Every call gets a fresh UUID.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    /// Create a new request with a random id.
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            method: method.to_string(),
            params: normalize_params(params),
        }
    }
}

/// `params` must be an object on the wire.
fn normalize_params(params: Value) -> Value {
    match params {
        Value::Object(_) => params,
        Value::Null => Value::Object(Map::new()),
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("value".to_string(), other);
            Value::Object(wrapped)
        }
    }
}

/// Outcome of one RPC call. Transport failures are folded into `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResult {
    Success { data: Map<String, Value> },
    Error { code: String, message: String },
}

impl RpcResult {
    /// Generic backend failure with the shared error code.
    pub fn backend_error(message: impl Into<String>) -> Self {
        RpcResult::Error {
            code: BACKEND_ERROR_CODE.to_string(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RpcResult::Success { .. })
    }

    /// The success payload, if any.
    pub fn data(&self) -> Option<&Map<String, Value>> {
        match self {
            RpcResult::Success { data } => Some(data),
            RpcResult::Error { .. } => None,
        }
    }
}

// ─── Headers ─────────────────────────────────────────────────────────────────

/// Outbound header set. Names are stored lowercased so merges are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcHeaders {
    entries: BTreeMap<String, String>,
}

impl RpcHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.entries.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rendering for logs with credentials and session ids masked.
    pub fn masked(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| {
                let shown = match k.as_str() {
                    "authorization" | "x-api-key" | "mcp-session-id" => mask_secret(v),
                    _ => v.clone(),
                };
                format!("{k}={shown}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Caller-supplied identity for one RPC call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub api_key: Option<String>,
    pub role: Option<String>,
    pub profile: Option<String>,
}

/// Mask a secret for logging: `abcd...wxyz`, or `***` when short.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Where a session token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// `rpc.static_session_id` from config.
    Static,
    /// Extracted from a backend `Set-Cookie` header.
    Negotiated,
    /// Random token synthesized after every negotiation attempt failed.
    Provisional,
}

/// Opaque session credential for the RPC backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub origin: SessionOrigin,
}

impl Session {
    pub fn new(token: impl Into<String>, origin: SessionOrigin) -> Self {
        Self {
            token: token.into(),
            origin,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.origin == SessionOrigin::Provisional
    }
}

// ─── Tool Catalog ────────────────────────────────────────────────────────────

/// `tools.list` result payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolListResult {
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

/// One tool as advertised by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema")]
    pub parameters: Option<ParamSchema>,
}

/// JSON-schema subset used for validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamSchema {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// Validation view of a catalog entry.
///
/// `allowed` is `None` when the entry declares no property list, in which
/// case any parameter name is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub required: BTreeSet<String>,
    pub allowed: Option<BTreeSet<String>>,
}

impl From<ToolSpec> for ToolDescriptor {
    fn from(spec: ToolSpec) -> Self {
        let (required, allowed) = match spec.parameters {
            Some(schema) => (
                schema.required.into_iter().collect(),
                schema.properties.map(|props| props.keys().cloned().collect()),
            ),
            None => (BTreeSet::new(), None),
        };
        Self {
            name: spec.name,
            description: spec.description,
            required,
            allowed,
        }
    }
}

impl ToolDescriptor {
    /// Compact JSON form embedded in the planning prompt.
    pub fn to_prompt_json(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("name".into(), Value::String(self.name.clone()));
        if let Some(desc) = &self.description {
            entry.insert("description".into(), Value::String(desc.clone()));
        }
        entry.insert(
            "required".into(),
            Value::Array(self.required.iter().cloned().map(Value::String).collect()),
        );
        if let Some(allowed) = &self.allowed {
            entry.insert(
                "params".into(),
                Value::Array(allowed.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(entry)
    }
}

/// A candidate tool invocation produced by planning.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub method: String,
    pub params: Map<String, Value>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
