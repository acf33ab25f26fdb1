//! RPC Client: JSON-RPC over HTTP to the remote tool backend.
//!
//! This module handles:
//! - Pooled and fallback HTTP transports
//! - Premature-close retry policy
//! - Session negotiation and caching
//! - Tool catalog fetch and structural validation of planned calls

pub mod catalog;
pub mod client;
pub mod errors;
pub mod retry;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod test_support;

// Re-exports for convenience
pub use catalog::Validation;
pub use client::ResilientRpcClient;
pub use errors::{McpError, TransportFailure};
pub use retry::{RetryDecision, RetryPolicy};
pub use session::SessionManager;
pub use transport::{HttpTransport, ReqwestTransport, TransportResponse};
pub use types::{CallContext, RpcResult, Session, SessionOrigin, ToolCall, ToolDescriptor};
