//! In-memory transport used by unit tests across the crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::errors::TransportFailure;
use super::transport::{HttpTransport, TransportResponse};
use super::types::RpcHeaders;

/// One request seen by a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub verb: &'static str,
    pub url: String,
    pub headers: RpcHeaders,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// JSON-RPC method of a POST body, if any.
    pub fn rpc_method(&self) -> Option<&str> {
        self.body.as_ref()?.get("method")?.as_str()
    }
}

type Responder =
    dyn Fn(usize, &RecordedRequest) -> Result<TransportResponse, TransportFailure> + Send + Sync;

/// Transport whose answers come from a closure given the 1-based call index.
pub struct ScriptedTransport {
    name: &'static str,
    responder: Box<Responder>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(name: &'static str, responder: F) -> Self
    where
        F: Fn(usize, &RecordedRequest) -> Result<TransportResponse, TransportFailure>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    async fn handle(&self, request: RecordedRequest) -> Result<TransportResponse, TransportFailure> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(index, &request)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    fn name(&self) -> &str {
        self.name
    }

    async fn get(
        &self,
        url: &str,
        headers: &RpcHeaders,
    ) -> Result<TransportResponse, TransportFailure> {
        self.handle(RecordedRequest {
            verb: "GET",
            url: url.to_string(),
            headers: headers.clone(),
            body: None,
        })
        .await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &RpcHeaders,
        body: &Value,
    ) -> Result<TransportResponse, TransportFailure> {
        self.handle(RecordedRequest {
            verb: "POST",
            url: url.to_string(),
            headers: headers.clone(),
            body: Some(body.clone()),
        })
        .await
    }
}

/// 200 response with a JSON body.
pub fn json_response(body: Value) -> TransportResponse {
    TransportResponse {
        status: 200,
        set_cookies: Vec::new(),
        body: body.to_string(),
    }
}

/// 200 response carrying a session cookie and an empty object body.
pub fn cookie_response(token: &str) -> TransportResponse {
    TransportResponse {
        status: 200,
        set_cookies: vec![format!("session_id={token}; Path=/; HttpOnly")],
        body: "{}".to_string(),
    }
}

pub fn premature_close() -> TransportFailure {
    TransportFailure::PrematureClose {
        reason: "connection closed before message completed".into(),
    }
}
