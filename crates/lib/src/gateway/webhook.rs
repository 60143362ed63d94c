//! Intercom webhook endpoint.
//!
//! Only the signature check and the envelope parse happen before the response; all
//! upstream work runs on a detached task (see `processor::spawn_processing`).

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::json;

use super::error::ApiError;
use super::server::GatewayState;
use crate::events::{EnvelopeError, WebhookEnvelope};
use crate::processor;
use crate::signature::{self, SIGNATURE_HEADER};

/// POST <webhook_path>: 200 `{status:"accepted", topic}`, 401 bad signature, 400 bad payload.
pub(crate) async fn intercom_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let secret = state.webhook_secret.as_deref().unwrap_or("");
    if !signature::verify_signature(secret, &body, provided) {
        return Err(ApiError::Unauthorized("Invalid signature".to_string()));
    }

    let (topic, envelope) = WebhookEnvelope::parse(&body).map_err(|e| {
        log::warn!("rejected webhook payload: {}", e);
        match e {
            EnvelopeError::InvalidJson(_) | EnvelopeError::NotAnObject => {
                ApiError::bad_request("Invalid JSON payload")
            }
            EnvelopeError::MissingTopic => ApiError::bad_request("Missing topic"),
        }
    })?;

    let delivery_id = uuid::Uuid::new_v4().to_string();
    log::info!("accepted webhook {} topic={}", delivery_id, topic);
    // Detached; the outcome is only visible in the logs.
    let _ = processor::spawn_processing(
        state.processor.clone(),
        delivery_id,
        topic.clone(),
        envelope,
    );

    Ok(Json(json!({ "status": "accepted", "topic": topic })))
}
