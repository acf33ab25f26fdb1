//! Resilient RPC client: the high-level interface for tool execution.
//!
//! Wraps a JSON-RPC envelope, attaches identity and session headers, sends it
//! over the pooled transport, and applies [`RetryPolicy`] on failure. Every
//! call produces an [`RpcResult`]; transport detail is logged, not returned.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::errors::{McpError, TransportFailure};
use super::retry::{RetryDecision, RetryPolicy};
use super::session::SessionManager;
use super::transport::{HttpTransport, ReqwestTransport, TransportResponse};
use super::types::{
    CallContext, JsonRpcRequest, RpcHeaders, RpcResult, Session, BACKEND_ERROR_CODE,
    EMPTY_RESPONSE_MESSAGE,
};
use crate::config::RpcConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// The only transport name the backend accepts in `MCP-Transport`.
pub const SUPPORTED_TRANSPORT: &str = "streamable-http";

/// Coerce any requested transport name to the supported literal.
pub fn normalize_transport(requested: Option<&str>) -> &'static str {
    if let Some(name) = requested.map(str::trim).filter(|n| !n.is_empty()) {
        if !name.eq_ignore_ascii_case(SUPPORTED_TRANSPORT) {
            tracing::debug!(requested = %name, using = SUPPORTED_TRANSPORT, "unsupported rpc transport");
        }
    }
    SUPPORTED_TRANSPORT
}

// ─── ResilientRpcClient ──────────────────────────────────────────────────────

/// RPC client with premature-close retry and a fallback transport.
pub struct ResilientRpcClient {
    endpoint: String,
    primary: Arc<dyn HttpTransport>,
    fallback: Arc<dyn HttpTransport>,
    sessions: Arc<SessionManager>,
    policy: RetryPolicy,
    configured_key: Option<String>,
    default_role: Option<String>,
    default_profile: Option<String>,
    transport_name: &'static str,
}

impl ResilientRpcClient {
    /// Build the production client: reqwest transports plus a session
    /// manager sharing the pooled transport.
    pub fn from_config(config: &RpcConfig) -> Result<Self, McpError> {
        let primary: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::pooled(config)?);
        let fallback: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::fallback(config)?);
        let sessions = Arc::new(SessionManager::new(config, primary.clone()));
        Ok(Self::new(config, primary, fallback, sessions))
    }

    /// Assemble a client from explicit parts.
    pub fn new(
        config: &RpcConfig,
        primary: Arc<dyn HttpTransport>,
        fallback: Arc<dyn HttpTransport>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            endpoint: config.endpoint.trim().to_string(),
            primary,
            fallback,
            sessions,
            policy: RetryPolicy::from_config(&config.retry),
            configured_key: config.resolved_api_key(),
            default_role: config.test_role.clone().filter(|r| !r.trim().is_empty()),
            default_profile: config.test_profile.clone().filter(|p| !p.trim().is_empty()),
            transport_name: normalize_transport(config.transport.as_deref()),
        }
    }

    /// Invoke `method` with `params` and interpret the response.
    pub async fn call(&self, method: &str, params: Value, ctx: &CallContext) -> RpcResult {
        let envelope = JsonRpcRequest::new(method, params);
        let body = match serde_json::to_value(&envelope) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(method = %method, error = %e, "failed to encode rpc request");
                return RpcResult::backend_error("request encoding failed");
            }
        };

        let session = match self.sessions.get_session().await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(method = %method, error = %e, "rpc call without session");
                None
            }
        };
        let headers = self.build_headers(ctx, session.as_ref());

        tracing::info!(
            method = %method,
            id = %envelope.id,
            transport = self.primary.name(),
            headers = %headers.masked(),
            "rpc call"
        );

        let result = self.send(method, &headers, &body).await;
        // Drop a provisional token once the backend has refused a call made with it
        if !result.is_success() && session.as_ref().is_some_and(Session::is_provisional) {
            tracing::warn!(method = %method, "provisional rpc session rejected, renegotiating next call");
            self.sessions.invalidate();
        }
        result
    }

    /// Primary transport with retries on premature close, then the fallback.
    async fn send(&self, method: &str, headers: &RpcHeaders, body: &Value) -> RpcResult {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let failure = match self.primary.post_json(&self.endpoint, headers, body).await {
                Ok(resp) => return interpret_response(method, &resp),
                Err(failure) => failure,
            };

            match self.policy.decide(attempts, &failure) {
                RetryDecision::Retry { delay } => {
                    tracing::warn!(
                        method = %method,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "premature close, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Fallback => {
                    tracing::warn!(
                        method = %method,
                        attempts,
                        fallback = self.fallback.name(),
                        "premature close persisted, switching transport"
                    );
                    return self.call_fallback(method, headers, body).await;
                }
                RetryDecision::Fail => return transport_error(method, attempts, &failure),
            }
        }
    }

    async fn call_fallback(&self, method: &str, headers: &RpcHeaders, body: &Value) -> RpcResult {
        match self.fallback.post_json(&self.endpoint, headers, body).await {
            Ok(resp) => interpret_response(method, &resp),
            Err(failure) => {
                tracing::error!(method = %method, transport = self.fallback.name(), error = %failure, "fallback rpc call failed");
                RpcResult::backend_error("backend unavailable")
            }
        }
    }

    /// Merge identity, transport and session headers.
    ///
    /// The configured credential wins over the caller's key; caller role and
    /// profile win over the configured test values.
    pub fn build_headers(&self, ctx: &CallContext, session: Option<&Session>) -> RpcHeaders {
        let mut headers = RpcHeaders::new();

        let api_key = self
            .configured_key
            .clone()
            .or_else(|| ctx.api_key.clone().filter(|k| !k.trim().is_empty()));
        if let Some(key) = api_key {
            headers.insert("Authorization", format!("Bearer {key}"));
            headers.insert("X-Api-Key", key);
        }

        let role = ctx
            .role
            .clone()
            .filter(|r| !r.trim().is_empty())
            .or_else(|| self.default_role.clone());
        if let Some(role) = role {
            headers.insert("X-Role", role);
        }
        let profile = ctx
            .profile
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.default_profile.clone());
        if let Some(profile) = profile {
            headers.insert("X-Profile", profile);
        }

        headers.insert("MCP-Transport", self.transport_name);
        if let Some(session) = session {
            headers.insert("mcp-session-id", session.token.clone());
        }
        headers
    }
}

// ─── Response interpretation ─────────────────────────────────────────────────

fn transport_error(method: &str, attempts: u32, failure: &TransportFailure) -> RpcResult {
    tracing::error!(method = %method, attempts, error = %failure, "rpc call failed");
    let message = match failure {
        TransportFailure::Timeout { .. } => "backend timeout",
        TransportFailure::PoolExhausted { .. } => "backend busy",
        _ => "backend unavailable",
    };
    RpcResult::backend_error(message)
}

fn interpret_response(method: &str, resp: &TransportResponse) -> RpcResult {
    if resp.is_success() {
        let result = interpret_body(&resp.body);
        if let RpcResult::Error { code, message } = &result {
            tracing::warn!(method = %method, code = %code, message = %message, "rpc error result");
        }
        return result;
    }

    tracing::error!(
        method = %method,
        status = resp.status,
        body_len = resp.body.len(),
        "rpc call returned non-success status"
    );
    match interpret_body(&resp.body) {
        err @ RpcResult::Error { .. } if has_error_object(&resp.body) => err,
        _ => RpcResult::backend_error(format!("backend returned HTTP {}", resp.status)),
    }
}

fn has_error_object(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .map(|v| v.get("error").is_some_and(|e| !e.is_null()))
        .unwrap_or(false)
}

/// Interpret a JSON-RPC response body.
///
/// - `error` object → `Error` with its code (stringified) and message
/// - `result`, or the whole body when absent → `Success` (`null` gives empty data)
/// - empty or unparsable → the fixed empty-response error
pub fn interpret_body(body: &str) -> RpcResult {
    if body.trim().is_empty() {
        return RpcResult::backend_error(EMPTY_RESPONSE_MESSAGE);
    }
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return RpcResult::backend_error(EMPTY_RESPONSE_MESSAGE),
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let code = match error.get("code") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => BACKEND_ERROR_CODE.to_string(),
        };
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| match error {
                Value::String(s) => s.clone(),
                _ => "unknown error".to_string(),
            });
        return RpcResult::Error { code, message };
    }

    let payload = match value {
        Value::Object(mut obj) => match obj.remove("result") {
            // A present but null result is an empty success
            Some(Value::Null) => return RpcResult::Success { data: Map::new() },
            Some(result) => result,
            None => Value::Object(obj),
        },
        other => other,
    };

    match payload {
        Value::Object(data) => RpcResult::Success { data },
        Value::Null => RpcResult::backend_error(EMPTY_RESPONSE_MESSAGE),
        // Scalar and array results are wrapped so callers always see a map
        other => {
            let mut data = Map::new();
            data.insert("result".to_string(), other);
            RpcResult::Success { data }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
