//! RPC client error types.

use thiserror::Error;

/// Errors that can occur during RPC client operations.
///
/// Per-call failures never surface as `McpError`; they are folded into an
/// [`RpcResult::Error`](super::types::RpcResult) so the caller always gets a
/// result. These variants cover setup and session negotiation.
#[derive(Debug, Error)]
pub enum McpError {
    /// Configuration error (missing endpoint, no usable credential).
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },

    /// Building an HTTP transport failed.
    #[error("transport '{transport}' could not be built: {reason}")]
    TransportInit {
        transport: String,
        reason: String,
    },
}

/// Classified failure of a single HTTP exchange.
///
/// Only [`TransportFailure::PrematureClose`] is retry-eligible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    /// The peer tore the connection down before a complete response arrived.
    #[error("connection closed prematurely: {reason}")]
    PrematureClose {
        reason: String,
    },

    /// Connect or response timeout.
    #[error("request timed out: {reason}")]
    Timeout {
        reason: String,
    },

    /// The connection could not be established.
    #[error("connect failed: {reason}")]
    Connect {
        reason: String,
    },

    /// No pooled connection became available within the acquire timeout.
    #[error("no connection available after {waited_ms}ms")]
    PoolExhausted {
        waited_ms: u64,
    },

    /// Anything else: body decode, request build, protocol errors.
    #[error("transport error: {reason}")]
    Other {
        reason: String,
    },
}

impl TransportFailure {
    /// Whether this is the retry-eligible premature-close signature.
    pub fn is_premature_close(&self) -> bool {
        matches!(self, TransportFailure::PrematureClose { .. })
    }
}
