//! JSON-RPC over HTTP transport.
//!
//! Handles the low-level HTTP exchange with the RPC backend:
//! - Pooled client with bounded connections and an acquire timeout
//! - A non-pooled HTTP/1.1 fallback client
//! - Classification of failures (premature close vs. everything else)
//! - Session cookie extraction from `Set-Cookie`

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use tokio::sync::Semaphore;

use super::errors::{McpError, TransportFailure};
use super::types::RpcHeaders;
use crate::config::RpcConfig;

/// Cookie attribute carrying the backend session token.
const SESSION_COOKIE: &str = "session_id=";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Raw HTTP response as the RPC layer needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Session token from the first `session_id=` cookie, if any.
    pub fn session_token(&self) -> Option<String> {
        extract_session_cookie(&self.set_cookies)
    }
}

/// One HTTP exchange with the backend. Implementations never retry.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn get(
        &self,
        url: &str,
        headers: &RpcHeaders,
    ) -> Result<TransportResponse, TransportFailure>;

    async fn post_json(
        &self,
        url: &str,
        headers: &RpcHeaders,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportFailure>;
}

// ─── Reqwest Transport ───────────────────────────────────────────────────────

/// `HttpTransport` backed by a `reqwest::Client`.
pub struct ReqwestTransport {
    name: String,
    client: reqwest::Client,
    /// Bounds in-flight requests to the pool size. `None` for the fallback.
    permits: Option<Arc<Semaphore>>,
    acquire_timeout: Duration,
}

impl ReqwestTransport {
    /// Primary transport: keep-alive pool sized by `rpc.pool`.
    ///
    /// reqwest has no max-lifetime knob, so connections are recycled by the
    /// idle timeout alone.
    pub fn pooled(config: &RpcConfig) -> Result<Self, McpError> {
        let timeouts = &config.timeouts;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeouts.connect_ms))
            .read_timeout(Duration::from_millis(timeouts.response_ms))
            .timeout(Duration::from_millis(
                timeouts.connect_ms + timeouts.write_ms + timeouts.response_ms,
            ))
            .pool_max_idle_per_host(config.pool.max_connections)
            .pool_idle_timeout(Duration::from_millis(
                config.pool.max_idle_ms.min(config.pool.max_lifetime_ms),
            ))
            .build()
            .map_err(|e| McpError::TransportInit {
                transport: "pooled".into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: "pooled".to_string(),
            client,
            permits: Some(Arc::new(Semaphore::new(config.pool.max_connections))),
            acquire_timeout: Duration::from_millis(timeouts.pending_acquire_ms),
        })
    }

    /// Fallback transport: fresh HTTP/1.1 connection per request.
    pub fn fallback(config: &RpcConfig) -> Result<Self, McpError> {
        let timeouts = &config.timeouts;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeouts.connect_ms))
            .timeout(Duration::from_millis(
                timeouts.connect_ms + timeouts.write_ms + timeouts.response_ms,
            ))
            .pool_max_idle_per_host(0)
            .http1_only()
            .build()
            .map_err(|e| McpError::TransportInit {
                transport: "fallback".into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: "fallback".to_string(),
            client,
            permits: None,
            acquire_timeout: Duration::from_millis(timeouts.pending_acquire_ms),
        })
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        headers: &RpcHeaders,
    ) -> Result<TransportResponse, TransportFailure> {
        let _permit = match &self.permits {
            Some(sem) => Some(
                tokio::time::timeout(self.acquire_timeout, sem.clone().acquire_owned())
                    .await
                    .map_err(|_| TransportFailure::PoolExhausted {
                        waited_ms: self.acquire_timeout.as_millis() as u64,
                    })?
                    .map_err(|e| TransportFailure::Other {
                        reason: format!("connection pool closed: {e}"),
                    })?,
            ),
            None => None,
        };

        let mut request = request;
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        // The body read is where a mid-response disconnect shows up
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        Ok(TransportResponse {
            status,
            set_cookies,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(
        &self,
        url: &str,
        headers: &RpcHeaders,
    ) -> Result<TransportResponse, TransportFailure> {
        self.execute(self.client.get(url), headers).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &RpcHeaders,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportFailure> {
        self.execute(self.client.post(url).json(body), headers).await
    }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Map a reqwest error onto the retry taxonomy.
///
/// Premature close is detected by walking the source chain for hyper's
/// incomplete-message error or an unexpected EOF from the socket.
pub fn classify_reqwest_error(err: &reqwest::Error) -> TransportFailure {
    let reason = error_chain_text(err);

    if is_premature_close(err) {
        return TransportFailure::PrematureClose { reason };
    }
    if err.is_timeout() {
        return TransportFailure::Timeout { reason };
    }
    if err.is_connect() {
        return TransportFailure::Connect { reason };
    }
    TransportFailure::Other { reason }
}

fn is_premature_close(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
            if io_err.kind() == std::io::ErrorKind::UnexpectedEof {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}

/// Find the `session_id=` attribute in a list of `Set-Cookie` values.
pub fn extract_session_cookie(set_cookies: &[String]) -> Option<String> {
    set_cookies
        .iter()
        .flat_map(|cookie| cookie.split(';'))
        .filter_map(|part| part.trim().strip_prefix(SESSION_COOKIE))
        .map(|token| token.trim().trim_matches('"'))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
