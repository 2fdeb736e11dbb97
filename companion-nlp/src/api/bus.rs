//! HTTP -> message bus bridge
//!
//! `POST /bus/:address` sends the request body to a bus address and returns
//! the reply:
//! - `application/json` bodies are framed; framed replies come back as JSON
//! - any other body is sent as text; text replies come back as `text/plain`
//!
//! The `x-companion-mode` header is forwarded as the `mode` message header.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use companion_common::{NlpAddress, Payload};
use tracing::debug;

use super::error::{ApiError, ApiResult};
use crate::router::MODE_HEADER;
use crate::AppState;

/// HTTP header carrying the analyze mode
pub const MODE_HTTP_HEADER: &str = "x-companion-mode";

/// POST /bus/:address
pub async fn post_message(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let address: NlpAddress = address
        .parse()
        .map_err(|_| ApiError::UnknownAddress(address.clone()))?;

    let payload = to_payload(&headers, body)?;

    let mut message_headers = HashMap::new();
    if let Some(mode) = headers.get(MODE_HTTP_HEADER) {
        let mode = mode
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("{} is not valid text", MODE_HTTP_HEADER)))?;
        message_headers.insert(MODE_HEADER.to_string(), mode.to_string());
    }

    debug!(topic = %address, "Forwarding HTTP request to bus");
    let reply = tokio::time::timeout(
        state.request_timeout,
        state
            .bus
            .request_with_headers(address.address(), message_headers, payload),
    )
    .await
    .map_err(|_| ApiError::Timeout(address.address().to_string()))??;

    match reply {
        Payload::Text(text) => Ok(text.into_response()),
        frame @ Payload::Frame(_) => {
            let value: serde_json::Value = frame.decode()?;
            Ok(Json(value).into_response())
        }
    }
}

fn to_payload(headers: &HeaderMap, body: Bytes) -> ApiResult<Payload> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    if is_json {
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Malformed JSON body: {}", e)))?;
        Ok(Payload::framed(&value)?)
    } else {
        let text = String::from_utf8(body.to_vec())
            .map_err(|_| ApiError::BadRequest("Body is not valid UTF-8".to_string()))?;
        Ok(Payload::Text(text))
    }
}

pub fn bus_routes() -> Router<AppState> {
    Router::new().route("/bus/:address", post(post_message))
}
