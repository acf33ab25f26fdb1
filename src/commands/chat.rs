//! `POST /api/chat`: one orchestrated chat turn.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::{api_key, header_value, ApiError, AppState, CORRELATION_HEADER, PROFILE_HEADER, ROLE_HEADER};
use crate::agent_core::{ChatReply, ChatRequest};

#[derive(Debug, Default, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: String,
}

/// A body that is not `{message}` is treated as an empty message.
pub fn parse_body(bytes: &[u8]) -> ChatBody {
    match serde_json::from_slice(bytes) {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable chat body");
            ChatBody::default()
        }
    }
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatReply>, ApiError> {
    let correlation_id = header_value(&headers, CORRELATION_HEADER);
    let req = ChatRequest {
        api_key: api_key(&headers),
        role: header_value(&headers, ROLE_HEADER),
        profile: header_value(&headers, PROFILE_HEADER),
        correlation_id: correlation_id.clone(),
        message: parse_body(&body).message,
    };
    let outcome = state
        .handle_chat(req)
        .await
        .map_err(|e| ApiError::from(e).with_correlation_id(correlation_id))?;
    Ok(Json(outcome.reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(br#"{"message":"hi"}"#).message, "hi");
        assert_eq!(parse_body(b"{}").message, "");
        assert_eq!(parse_body(b"garbage").message, "");
        assert_eq!(parse_body(br#"{"message":42}"#).message, "");
    }
}
