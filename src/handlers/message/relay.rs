// handlers/message/relay.rs - GET|POST /api/message handler

use axum::{extract::State, http::StatusCode};
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::CapturedRequest;
use crate::state::AppState;

/**
 * GET|POST /api/message - Put a text message on the relay queue
 *
 * `message` comes from the query string, or from a JSON body
 * `{"message": "..."}` when the query has none. An unparseable body is
 * treated the same as a missing message.
 */
pub async fn relay(
    State(state): State<AppState>,
    request: CapturedRequest,
) -> Result<(StatusCode, &'static str), ApiError> {
    let Some(message) = message_from(&request) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            "This HTTP triggered did not receive a message.",
        ));
    };

    state.relay.send_message(&message).await?;
    tracing::info!("Relayed message ({} bytes)", message.len());
    Ok((StatusCode::OK, "This HTTP triggered function executed successfully."))
}

fn message_from(request: &CapturedRequest) -> Option<String> {
    request.query_param("message").or_else(|| {
        match serde_json::from_slice::<Value>(&request.body).ok()?.get("message")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    })
}
