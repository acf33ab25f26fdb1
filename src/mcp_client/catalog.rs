//! Tool catalog: fetched per turn through the RPC client, never persisted.
//!
//! Validation is structural only: the method must exist, required fields
//! must be present, and when the entry lists its properties no other field
//! may appear.

use serde_json::{json, Value};

use super::client::ResilientRpcClient;
use super::types::{CallContext, RpcResult, ToolCall, ToolDescriptor, ToolListResult};

/// RPC method that lists callable tools.
pub const LIST_METHOD: &str = "tools.list";

/// Result of checking a candidate call against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(ToolCall),
    Invalid { reason: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// Fetch the catalog. Any failure yields an empty catalog, so every
/// candidate call will fail validation.
pub async fn fetch_catalog(client: &ResilientRpcClient, ctx: &CallContext) -> Vec<ToolDescriptor> {
    match client.call(LIST_METHOD, json!({}), ctx).await {
        RpcResult::Success { data } => parse_catalog(Value::Object(data)),
        RpcResult::Error { code, message } => {
            tracing::warn!(code = %code, message = %message, "tool catalog unavailable");
            Vec::new()
        }
    }
}

/// Decode a `tools.list` payload into descriptors.
pub fn parse_catalog(payload: Value) -> Vec<ToolDescriptor> {
    match serde_json::from_value::<ToolListResult>(payload) {
        Ok(list) => {
            let tools: Vec<ToolDescriptor> = list.tools.into_iter().map(Into::into).collect();
            tracing::debug!(count = tools.len(), "tool catalog fetched");
            tools
        }
        Err(e) => {
            tracing::warn!(error = %e, "malformed tool catalog");
            Vec::new()
        }
    }
}

/// JSON array of descriptors for the planning prompt.
pub fn catalog_prompt_json(catalog: &[ToolDescriptor]) -> String {
    let entries: Vec<Value> = catalog.iter().map(ToolDescriptor::to_prompt_json).collect();
    Value::Array(entries).to_string()
}

/// Check `call` against `catalog`.
pub fn validate(catalog: &[ToolDescriptor], call: ToolCall) -> Validation {
    let Some(tool) = catalog.iter().find(|t| t.name == call.method) else {
        return Validation::Invalid {
            reason: format!("unknown method: '{}'", call.method),
        };
    };

    if let Some(missing) = tool.required.iter().find(|f| !call.params.contains_key(*f)) {
        return Validation::Invalid {
            reason: format!("missing required field: '{missing}'"),
        };
    }

    if let Some(allowed) = &tool.allowed {
        if let Some(extra) = call.params.keys().find(|k| !allowed.contains(*k)) {
            return Validation::Invalid {
                reason: format!("unexpected field: '{extra}'"),
            };
        }
    }

    Validation::Valid(call)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn catalog() -> Vec<ToolDescriptor> {
        parse_catalog(json!({
            "tools": [
                {"name": "orders.get"},
                {
                    "name": "partners.search",
                    "description": "Find customers",
                    "parameters": {
                        "properties": {"query": {"type": "string"}, "limit": {"type": "integer"}},
                        "required": ["query"]
                    }
                }
            ]
        }))
    }

    fn call(method: &str, params: Value) -> ToolCall {
        let params: Map<String, Value> = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolCall {
            method: method.into(),
            params,
        }
    }

    #[test]
    fn test_parse_catalog() {
        let tools = catalog();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[1].description.as_deref(), Some("Find customers"));
    }

    #[test]
    fn test_parse_catalog_malformed_is_empty() {
        assert!(parse_catalog(json!({"tools": "nope"})).is_empty());
        assert!(parse_catalog(json!({})).is_empty());
    }

    #[test]
    fn test_unknown_method_is_invalid() {
        let result = validate(&catalog(), call("orders.delete", json!({})));
        assert!(matches!(result, Validation::Invalid { .. }));
    }

    #[test]
    fn test_no_schema_accepts_any_params() {
        let result = validate(&catalog(), call("orders.get", json!({"orderId": "SO001"})));
        assert!(result.is_valid());
    }

    #[test]
    fn test_missing_required_field_is_invalid() {
        let result = validate(&catalog(), call("partners.search", json!({"limit": 5})));
        assert_eq!(
            result,
            Validation::Invalid {
                reason: "missing required field: 'query'".into()
            }
        );
    }

    #[test]
    fn test_undeclared_field_is_invalid() {
        let result = validate(
            &catalog(),
            call("partners.search", json!({"query": "acme", "country": "BE"})),
        );
        assert_eq!(
            result,
            Validation::Invalid {
                reason: "unexpected field: 'country'".into()
            }
        );
    }

    #[test]
    fn test_exact_field_set_is_valid() {
        let candidate = call("partners.search", json!({"query": "acme", "limit": 5}));
        assert_eq!(
            validate(&catalog(), candidate.clone()),
            Validation::Valid(candidate)
        );
    }

    #[test]
    fn test_empty_catalog_rejects_everything() {
        assert!(!validate(&[], call("orders.get", json!({}))).is_valid());
    }

    #[test]
    fn test_catalog_prompt_json() {
        let json = catalog_prompt_json(&catalog());
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["name"], "orders.get");
        assert_eq!(parsed[1]["required"], json!(["query"]));
    }
}
