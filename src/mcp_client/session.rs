//! Session negotiation and caching.
//!
//! The RPC backend wants an opaque session token echoed on every call via
//! `mcp-session-id`. The token is negotiated lazily, at most once at a time,
//! and reused until [`SessionManager::invalidate`] is called.
//!
//! Negotiation order (first token wins):
//! 1. GET the session endpoint
//! 2. POST a `handshake` RPC to the session endpoint
//! 3. the same two steps against the base endpoint
//!
//! If all four yield nothing, a random provisional token is cached and
//! tagged [`SessionOrigin::Provisional`]. The client invalidates a
//! provisional token after the first call made with it fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::json;

use super::client::normalize_transport;
use super::errors::McpError;
use super::transport::{HttpTransport, TransportResponse};
use super::types::{mask_secret, JsonRpcRequest, RpcHeaders, Session, SessionOrigin};
use crate::config::RpcConfig;

/// Client name announced in the handshake.
const CLIENT_NAME: &str = "toolgate";

// ─── SessionManager ──────────────────────────────────────────────────────────

/// Owns the single-slot session cache for one RPC backend.
pub struct SessionManager {
    transport: Arc<dyn HttpTransport>,
    session_endpoint: String,
    base_endpoint: String,
    static_session: Option<String>,
    api_key: Option<String>,
    role: Option<String>,
    profile: Option<String>,
    transport_name: &'static str,
    cache: parking_lot::RwLock<Option<Session>>,
    /// Held across the whole negotiation so only one runs at a time.
    negotiation_lock: tokio::sync::Mutex<()>,
    negotiations: AtomicU64,
}

impl SessionManager {
    pub fn new(config: &RpcConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            session_endpoint: config.resolved_session_endpoint(),
            base_endpoint: config.endpoint.trim().to_string(),
            static_session: config.static_session(),
            api_key: config.resolved_api_key(),
            role: config.test_role.clone().filter(|r| !r.trim().is_empty()),
            profile: config.test_profile.clone().filter(|p| !p.trim().is_empty()),
            transport_name: normalize_transport(config.transport.as_deref()),
            cache: parking_lot::RwLock::new(None),
            negotiation_lock: tokio::sync::Mutex::new(()),
            negotiations: AtomicU64::new(0),
        }
    }

    /// Return the session to use for the next call.
    ///
    /// A configured static session always wins. Otherwise the cached session
    /// is returned, negotiating one first if the cache is empty. Callers that
    /// arrive during a negotiation wait for it and share its result.
    pub async fn get_session(&self) -> Result<Session, McpError> {
        if let Some(token) = &self.static_session {
            return Ok(Session::new(token.clone(), SessionOrigin::Static));
        }
        if let Some(session) = self.cached() {
            return Ok(session);
        }

        let _guard = self.negotiation_lock.lock().await;
        // Another caller may have finished negotiating while we waited
        if let Some(session) = self.cached() {
            return Ok(session);
        }
        let session = self.negotiate().await?;
        *self.cache.write() = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached session. The next `get_session` renegotiates.
    pub fn invalidate(&self) {
        if self.cache.write().take().is_some() {
            tracing::info!("rpc session invalidated");
        }
    }

    /// The cached session, if any.
    pub fn cached(&self) -> Option<Session> {
        self.cache.read().clone()
    }

    /// How many negotiations have run since construction.
    pub fn negotiation_count(&self) -> u64 {
        self.negotiations.load(Ordering::SeqCst)
    }

    // ─── Negotiation ─────────────────────────────────────────────────────

    async fn negotiate(&self) -> Result<Session, McpError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| McpError::ConfigError {
            reason: "no usable rpc credential configured for session negotiation".into(),
        })?;
        if self.base_endpoint.is_empty() {
            return Err(McpError::ConfigError {
                reason: "rpc.endpoint is empty".into(),
            });
        }

        self.negotiations.fetch_add(1, Ordering::SeqCst);
        let headers = self.negotiation_headers(api_key);

        let mut endpoints = vec![self.session_endpoint.as_str()];
        if self.base_endpoint != self.session_endpoint {
            endpoints.push(self.base_endpoint.as_str());
        }

        for endpoint in endpoints {
            if let Some(token) = self.probe(endpoint, &headers).await {
                tracing::info!(
                    endpoint = %endpoint,
                    step = "probe",
                    session = %mask_secret(&token),
                    "rpc session negotiated"
                );
                return Ok(Session::new(token, SessionOrigin::Negotiated));
            }
            if let Some(token) = self.handshake(endpoint, &headers).await {
                tracing::info!(
                    endpoint = %endpoint,
                    step = "handshake",
                    session = %mask_secret(&token),
                    "rpc session negotiated"
                );
                return Ok(Session::new(token, SessionOrigin::Negotiated));
            }
        }

        let token = uuid::Uuid::new_v4().to_string();
        tracing::warn!(
            session_endpoint = %self.session_endpoint,
            base_endpoint = %self.base_endpoint,
            "rpc session negotiation yielded no token; using provisional session"
        );
        Ok(Session::new(token, SessionOrigin::Provisional))
    }

    async fn probe(&self, endpoint: &str, headers: &RpcHeaders) -> Option<String> {
        let result = self.transport.get(endpoint, headers).await;
        token_from(endpoint, "probe", result)
    }

    async fn handshake(&self, endpoint: &str, headers: &RpcHeaders) -> Option<String> {
        let request = JsonRpcRequest::new(
            "handshake",
            json!({ "protocol": "mcp", "client": CLIENT_NAME }),
        );
        let body = match serde_json::to_value(&request) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode handshake");
                return None;
            }
        };
        let result = self.transport.post_json(endpoint, headers, &body).await;
        token_from(endpoint, "handshake", result)
    }

    fn negotiation_headers(&self, api_key: &str) -> RpcHeaders {
        let mut headers = RpcHeaders::new();
        headers.insert("Authorization", format!("Bearer {api_key}"));
        headers.insert("X-Api-Key", api_key);
        headers.insert("MCP-Transport", self.transport_name);
        if let Some(role) = &self.role {
            headers.insert("X-Role", role.clone());
        }
        if let Some(profile) = &self.profile {
            headers.insert("X-Profile", profile.clone());
        }
        headers
    }
}

fn token_from(
    endpoint: &str,
    step: &str,
    result: Result<TransportResponse, super::errors::TransportFailure>,
) -> Option<String> {
    match result {
        Ok(resp) => {
            let token = resp.session_token();
            if token.is_none() {
                tracing::debug!(endpoint = %endpoint, step, status = resp.status, "no session cookie");
            }
            token
        }
        Err(e) => {
            tracing::debug!(endpoint = %endpoint, step, error = %e, "session step failed");
            None
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp_client::test_support::{cookie_response, json_response, ScriptedTransport};
    use std::time::Duration;

    fn config() -> RpcConfig {
        RpcConfig {
            endpoint: "http://rpc.local/mcp".into(),
            auth_token: Some("key-0123456789".into()),
            ..RpcConfig::default()
        }
    }

    #[tokio::test]
    async fn test_static_session_bypasses_negotiation() {
        let transport = Arc::new(ScriptedTransport::new("t", |_, _| Ok(cookie_response("x"))));
        let cfg = RpcConfig {
            static_session_id: Some("fixed".into()),
            ..config()
        };
        let manager = SessionManager::new(&cfg, transport.clone());
        let session = manager.get_session().await.unwrap();
        assert_eq!(session, Session::new("fixed", SessionOrigin::Static));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(manager.negotiation_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_cookie_is_used_and_cached() {
        let transport = Arc::new(ScriptedTransport::new("t", |_, _| Ok(cookie_response("abc"))));
        let manager = SessionManager::new(&config(), transport.clone());

        let first = manager.get_session().await.unwrap();
        let second = manager.get_session().await.unwrap();
        assert_eq!(first.token, "abc");
        assert_eq!(first.origin, SessionOrigin::Negotiated);
        assert_eq!(first, second);
        assert_eq!(transport.call_count(), 1);

        let request = &transport.requests()[0];
        assert_eq!(request.verb, "GET");
        assert_eq!(request.url, "http://rpc.local/mcp/session");
        assert_eq!(request.headers.get("authorization"), Some("Bearer key-0123456789"));
        assert_eq!(request.headers.get("mcp-transport"), Some("streamable-http"));
    }

    #[tokio::test]
    async fn test_handshake_after_empty_probe() {
        let transport = Arc::new(ScriptedTransport::new("t", |_, req| {
            if req.verb == "GET" {
                Ok(json_response(json!({})))
            } else {
                Ok(cookie_response("from-handshake"))
            }
        }));
        let manager = SessionManager::new(&config(), transport.clone());
        let session = manager.get_session().await.unwrap();
        assert_eq!(session.token, "from-handshake");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].rpc_method(), Some("handshake"));
        assert_eq!(requests[1].body.as_ref().unwrap()["params"]["protocol"], "mcp");
    }

    #[tokio::test]
    async fn test_base_endpoint_tried_after_session_endpoint() {
        let transport = Arc::new(ScriptedTransport::new("t", |_, req| {
            if req.url.ends_with("/session") {
                Ok(json_response(json!({})))
            } else {
                Ok(cookie_response("base-token"))
            }
        }));
        let manager = SessionManager::new(&config(), transport.clone());
        let session = manager.get_session().await.unwrap();
        assert_eq!(session.token, "base-token");
        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.requests()[2].url, "http://rpc.local/mcp");
    }

    #[tokio::test]
    async fn test_total_failure_yields_provisional_session() {
        let transport = Arc::new(ScriptedTransport::new("t", |_, _| {
            Err(crate::mcp_client::errors::TransportFailure::Connect {
                reason: "refused".into(),
            })
        }));
        let manager = SessionManager::new(&config(), transport.clone());
        let session = manager.get_session().await.unwrap();
        assert!(session.is_provisional());
        assert!(uuid::Uuid::parse_str(&session.token).is_ok());
        assert_eq!(transport.call_count(), 4);

        // Cached like any other session
        assert_eq!(manager.get_session().await.unwrap(), session);
        assert_eq!(manager.negotiation_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_is_fatal() {
        let cfg = RpcConfig {
            auth_token: Some("YOUR_API_KEY".into()),
            ..config()
        };
        let transport = Arc::new(ScriptedTransport::new("t", |_, _| Ok(cookie_response("x"))));
        let manager = SessionManager::new(&cfg, transport.clone());
        let err = manager.get_session().await.unwrap_err();
        assert!(matches!(err, McpError::ConfigError { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_renegotiation() {
        let transport = Arc::new(ScriptedTransport::new("t", |n, _| {
            Ok(cookie_response(&format!("token-{n}")))
        }));
        let manager = SessionManager::new(&config(), transport.clone());

        assert_eq!(manager.get_session().await.unwrap().token, "token-1");
        manager.invalidate();
        assert!(manager.cached().is_none());
        assert_eq!(manager.get_session().await.unwrap().token, "token-2");
        assert_eq!(manager.negotiation_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_negotiation() {
        let transport = Arc::new(
            ScriptedTransport::new("t", |n, _| Ok(cookie_response(&format!("token-{n}"))))
                .with_delay(Duration::from_millis(50)),
        );
        let manager = Arc::new(SessionManager::new(&config(), transport.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_session().await.unwrap() })
            })
            .collect();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().token);
        }

        assert_eq!(manager.negotiation_count(), 1);
        assert_eq!(transport.call_count(), 1);
        assert!(tokens.iter().all(|t| t == "token-1"));
    }
}
