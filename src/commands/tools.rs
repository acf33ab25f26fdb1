//! `POST /api/mcp/{method}`: forward one RPC call as-is.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{Map, Value};

use super::{
    api_key, header_value, ApiError, AppState, CORRELATION_HEADER, PROFILE_HEADER, ROLE_HEADER,
};
use crate::agent_core::ToolReply;
use crate::mcp_client::CallContext;

/// Request body as RPC params. Empty or non-object bodies become `{}`.
pub fn params_from_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(params)) => Value::Object(params),
        Ok(_) | Err(_) => {
            tracing::debug!("tool body is not a JSON object, sending empty params");
            Value::Object(Map::new())
        }
    }
}

pub async fn call_tool(
    State(state): State<AppState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ToolReply>), ApiError> {
    let ctx = CallContext {
        api_key: api_key(&headers),
        role: header_value(&headers, ROLE_HEADER),
        profile: header_value(&headers, PROFILE_HEADER),
    };
    let reply = state
        .handle_tool(ctx, &method, params_from_body(&body))
        .await
        .map_err(|e| {
            ApiError::from(e).with_correlation_id(header_value(&headers, CORRELATION_HEADER))
        })?;
    let status = if reply.code == ToolReply::OK {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(reply)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_from_body() {
        assert_eq!(params_from_body(b""), json!({}));
        assert_eq!(params_from_body(b"  \n"), json!({}));
        assert_eq!(params_from_body(br#"{"orderId":"SO001"}"#), json!({"orderId": "SO001"}));
        assert_eq!(params_from_body(b"[1,2]"), json!({}));
        assert_eq!(params_from_body(b"{broken"), json!({}));
    }
}
