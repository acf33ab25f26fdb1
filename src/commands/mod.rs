//! HTTP commands exposed to chat clients.
//!
//! Every route shares one [`AppState`]. Admission control runs as a
//! middleware layer in front of all routes.

pub mod chat;
pub mod health;
pub mod tools;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::agent_core::{AgentError, Orchestrator};

/// Shared state handed to every handler.
pub type AppState = Arc<Orchestrator>;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const ROLE_HEADER: &str = "x-role";
pub const PROFILE_HEADER: &str = "x-profile";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/mcp/:method", post(tools::call_tool))
        .route("/api/health", get(health::health))
        .layer(middleware::from_fn_with_state(state.clone(), admission_gate))
        .with_state(state)
}

/// Reject over-limit callers with 429 before any handler runs.
async fn admission_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = api_key(req.headers());
    match state.admit(key.as_deref()) {
        Ok(()) => next.run(req).await,
        Err(e) => ApiError::from(e)
            .with_correlation_id(header_value(req.headers(), CORRELATION_HEADER))
            .into_response(),
    }
}

// ─── Headers ─────────────────────────────────────────────────────────────────

/// Trimmed, non-empty header value. `HeaderMap` lookups ignore case.
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Caller credential: `X-Api-Key`, else an `Authorization: Bearer` token.
pub fn api_key(headers: &HeaderMap) -> Option<String> {
    header_value(headers, API_KEY_HEADER).or_else(|| {
        let auth = header_value(headers, axum::http::header::AUTHORIZATION.as_str())?;
        let (scheme, token) = auth.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
    })
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
    #[serde(rename = "correlationId")]
    correlation_id: String,
}

/// Wire form of an [`AgentError`]: its status and `{code, message, correlationId}`.
///
/// The caller's correlation id is echoed when known, otherwise a fresh one
/// is generated.
#[derive(Debug)]
pub struct ApiError {
    pub error: AgentError,
    pub correlation_id: Option<String>,
}

impl ApiError {
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

impl From<AgentError> for ApiError {
    fn from(error: AgentError) -> Self {
        Self {
            error,
            correlation_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: self.error.code(),
            message: self.error.public_message(),
            correlation_id: self
                .correlation_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        };
        (status, Json(body)).into_response()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::inference::test_support::ScriptedModel;
    use crate::mcp_client::test_support::{json_response, ScriptedTransport};
    use crate::mcp_client::{ResilientRpcClient, SessionManager};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const CONFIG: &str = r#"
llm:
  model: llama3
rpc:
  endpoint: "http://rpc.local/mcp"
  auth_token: "configured-key-123"
  static_session_id: "sess-static"
rate_limit:
  requests_per_minute: 2
prompts:
  role:
    sales: {}
"#;

    fn app_with(config: &str, model: ScriptedModel) -> Router {
        let config = parse_config(config).unwrap();
        let transport = Arc::new(ScriptedTransport::new("primary", |_, req| {
            match req.rpc_method() {
                Some("tools.list") => Ok(json_response(
                    json!({"result": {"tools": [{"name": "orders.get"}]}}),
                )),
                Some("orders.get") => Ok(json_response(json!({"result": {"state": "sale"}}))),
                _ => Ok(json_response(json!({"error": {"code": -32601, "message": "nope"}}))),
            }
        }));
        let fallback = Arc::new(ScriptedTransport::new("fallback", |_, _| {
            Ok(json_response(json!({})))
        }));
        let sessions = Arc::new(SessionManager::new(&config.rpc, transport.clone()));
        let rpc = Arc::new(ResilientRpcClient::new(&config.rpc, transport, fallback, sessions));
        router(Arc::new(Orchestrator::new(&config, Arc::new(model), rpc)))
    }

    fn app() -> Router {
        app_with(
            CONFIG,
            ScriptedModel::phased(
                "Checking.",
                r#"{"mcpCall":{"method":"orders.get","params":{"orderId":"SO001"}}}"#,
                "Order SO001 is confirmed.",
            ),
        )
    }

    fn post_json(uri: &str, headers: &[(&str, &str)], body: &str) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method("POST").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: HttpRequest<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[test]
    fn test_api_key_prefers_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer token-b".parse().unwrap());
        assert_eq!(api_key(&headers).as_deref(), Some("token-b"));

        headers.insert("x-api-key", " key-a ".parse().unwrap());
        assert_eq!(api_key(&headers).as_deref(), Some("key-a"));
    }

    #[test]
    fn test_api_key_ignores_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert!(api_key(&headers).is_none());
    }

    #[tokio::test]
    async fn test_chat_executes_tool() {
        let app = app();
        let (status, body) = send(
            &app,
            post_json(
                "/api/chat",
                &[("X-Api-Key", "user-1"), ("X-ROLE", "sales"), ("x-correlation-id", "trace-7")],
                r#"{"message":"status of order SO001"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Order SO001 is confirmed.");
        assert!(uuid::Uuid::parse_str(body["correlationId"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_chat_error_bodies() {
        let app = app();

        let (status, body) = send(&app, post_json("/api/chat", &[("x-role", "sales")], r#"{"message":"hi"}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MW001");
        assert!(body["correlationId"].is_string());

        let (status, body) = send(
            &app,
            post_json("/api/chat", &[("x-api-key", "user-2"), ("x-role", "ghost")], r#"{"message":"hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "MW002");

        let (status, body) = send(
            &app,
            post_json("/api/chat", &[("x-api-key", "user-3"), ("x-role", "sales")], "not json"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MW003");
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let app = app();
        let headers = [("x-api-key", "busy"), ("x-role", "sales")];
        for _ in 0..2 {
            let (status, _) = send(&app, post_json("/api/chat", &headers, r#"{"message":"hi"}"#)).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = send(&app, post_json("/api/chat", &headers, r#"{"message":"hi"}"#)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "MW007");
    }

    #[tokio::test]
    async fn test_error_bodies_echo_inbound_correlation_id() {
        let app = app();

        let (status, body) = send(
            &app,
            post_json("/api/chat", &[("x-role", "sales"), ("X-Correlation-Id", "trace-7")], r#"{"message":"hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["correlationId"], "trace-7");

        let headers = [("x-api-key", "chatty"), ("x-role", "sales"), ("x-correlation-id", "trace-8")];
        for _ in 0..2 {
            send(&app, post_json("/api/chat", &headers, r#"{"message":"hi"}"#)).await;
        }
        let (status, body) = send(&app, post_json("/api/chat", &headers, r#"{"message":"hi"}"#)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["correlationId"], "trace-8");

        let (status, body) = send(
            &app,
            post_json("/api/mcp/orders.get", &[("x-correlation-id", "trace-9")], "{}"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["correlationId"], "trace-9");
    }

    #[tokio::test]
    async fn test_llm_disabled_returns_503() {
        let config = CONFIG.replace("  model: llama3", "  enabled: false");
        let app = app_with(&config, ScriptedModel::phased("", "", ""));
        let (status, body) = send(
            &app,
            post_json("/api/chat", &[("x-api-key", "k"), ("x-role", "sales")], r#"{"message":"hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "LLM001");
    }

    #[tokio::test]
    async fn test_tool_endpoint() {
        let app = app();
        let (status, body) = send(
            &app,
            post_json("/api/mcp/orders.get", &[("authorization", "Bearer user-4")], r#"{"orderId":"SO001"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "OK");
        assert_eq!(body["data"]["state"], "sale");

        let (status, body) = send(&app, post_json("/api/mcp/orders.get", &[], "{}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MW001");
    }

    #[tokio::test]
    async fn test_tool_endpoint_backend_error() {
        let app = app();
        let (status, body) = send(&app, post_json("/api/mcp/orders.delete", &[("x-api-key", "user-5")], "")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "-32601");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app();
        let req = HttpRequest::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "up");
        assert_eq!(body["components"]["llm"]["status"], "up");
        assert_eq!(body["components"]["rpc"]["status"], "up");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
