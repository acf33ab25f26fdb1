//! Agent Core error types.
//!
//! Each variant maps to a stable wire code and HTTP status. The `Display`
//! text carries detail for logs; [`AgentError::public_message`] is what the
//! caller sees.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that terminate a request.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No credential on the request.
    #[error("missing api key")]
    MissingCredential,

    /// Role/profile absent or not known to the prompt configuration.
    #[error("invalid role or profile: role={role:?} profile={profile:?}")]
    InvalidRoleOrProfile {
        role: Option<String>,
        profile: Option<String>,
    },

    /// Empty or whitespace-only message.
    #[error("empty message")]
    EmptyMessage,

    /// Any downstream failure (LLM or RPC).
    #[error("backend error: {reason}")]
    Backend { reason: String },

    /// Admission control rejected the request.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Chat is switched off by `llm.enabled`.
    #[error("llm integration disabled")]
    LlmDisabled,

    /// The tool endpoint is switched off by `rpc.enabled`.
    #[error("rpc integration disabled")]
    RpcDisabled,
}

impl AgentError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::MissingCredential => "MW001",
            AgentError::InvalidRoleOrProfile { .. } => "MW002",
            AgentError::EmptyMessage => "MW003",
            AgentError::Backend { .. } => "MW005",
            AgentError::RateLimited => "MW007",
            AgentError::LlmDisabled => "LLM001",
            AgentError::RpcDisabled => "OD001",
        }
    }

    /// HTTP status for the wire response.
    pub fn status(&self) -> u16 {
        match self {
            AgentError::MissingCredential => 401,
            AgentError::InvalidRoleOrProfile { .. } => 403,
            AgentError::EmptyMessage => 400,
            AgentError::Backend { .. } => 502,
            AgentError::RateLimited => 429,
            AgentError::LlmDisabled | AgentError::RpcDisabled => 503,
        }
    }

    /// Detail-free message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AgentError::MissingCredential => "Missing API key",
            AgentError::InvalidRoleOrProfile { .. } => "Invalid role or profile",
            AgentError::EmptyMessage => "Message must not be empty",
            AgentError::Backend { .. } => "Backend service error",
            AgentError::RateLimited => "Rate limit exceeded",
            AgentError::LlmDisabled => "LLM integration is disabled",
            AgentError::RpcDisabled => "RPC integration is disabled",
        }
    }
}

impl From<InferenceError> for AgentError {
    fn from(e: InferenceError) -> Self {
        AgentError::Backend {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (AgentError::MissingCredential, "MW001", 401),
            (
                AgentError::InvalidRoleOrProfile {
                    role: None,
                    profile: None,
                },
                "MW002",
                403,
            ),
            (AgentError::EmptyMessage, "MW003", 400),
            (
                AgentError::Backend {
                    reason: "x".into(),
                },
                "MW005",
                502,
            ),
            (AgentError::RateLimited, "MW007", 429),
            (AgentError::LlmDisabled, "LLM001", 503),
            (AgentError::RpcDisabled, "OD001", 503),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn test_public_message_hides_backend_detail() {
        let err = AgentError::from(InferenceError::HttpError {
            status: 500,
            body: "stack trace with secrets".into(),
        });
        assert!(err.to_string().contains("stack trace"));
        assert!(!err.public_message().contains("stack trace"));
    }
}
