//! Operator endpoints over the shared clients: Teams browsing and posting, recent
//! Intercom conversations, manual sync, and forwarding chat messages into Intercom.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::server::GatewayState;
use crate::chat::{ChatPlatform, ContentType};

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

fn authenticated_chat(state: &GatewayState) -> Result<&dyn ChatPlatform, ApiError> {
    let chat = state.processor.chat().as_ref();
    if !chat.is_authenticated() {
        return Err(crate::chat::ChatError::NotAuthenticated.into());
    }
    Ok(chat)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) async fn list_teams(State(state): State<GatewayState>) -> ApiResult {
    let teams = authenticated_chat(&state)?.get_teams().await?;
    Ok(Json(json!({ "count": teams.len(), "teams": teams })))
}

pub(crate) async fn list_channels(
    State(state): State<GatewayState>,
    Path(team_id): Path<String>,
) -> ApiResult {
    let channels = authenticated_chat(&state)?.get_channels(&team_id).await?;
    Ok(Json(json!({ "count": channels.len(), "channels": channels })))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CreateChannelRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub(crate) async fn create_channel(
    State(state): State<GatewayState>,
    Path(team_id): Path<String>,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult {
    let chat = authenticated_chat(&state)?;
    let name = non_empty(req.name).ok_or_else(|| ApiError::bad_request("Channel name is required"))?;
    let channel = chat
        .create_channel(&team_id, &name, req.description.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(json!({ "channel": channel })))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SendMessageRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    message_type: Option<String>,
}

pub(crate) async fn send_message(
    State(state): State<GatewayState>,
    Path((team_id, channel_id)): Path<(String, String)>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult {
    let chat = authenticated_chat(&state)?;
    let message =
        non_empty(req.message).ok_or_else(|| ApiError::bad_request("Message content is required"))?;
    let content_type = req
        .message_type
        .as_deref()
        .map(ContentType::parse)
        .unwrap_or_default();
    let sent = chat
        .send_message(&team_id, &channel_id, &message, content_type)
        .await?;
    Ok(Json(json!({ "message": sent })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    limit: Option<usize>,
}

pub(crate) async fn list_messages(
    State(state): State<GatewayState>,
    Path((team_id, channel_id)): Path<(String, String)>,
    Query(q): Query<LimitQuery>,
) -> ApiResult {
    let messages = authenticated_chat(&state)?
        .get_messages(&team_id, &channel_id, q.limit.unwrap_or(50))
        .await?;
    Ok(Json(json!({ "count": messages.len(), "messages": messages })))
}

pub(crate) async fn list_conversations(
    State(state): State<GatewayState>,
    Query(q): Query<LimitQuery>,
) -> ApiResult {
    let limit = q.limit.unwrap_or(20).min(u32::MAX as usize) as u32;
    let conversations = state.processor.messaging().get_conversations(limit).await?;
    Ok(Json(
        json!({ "count": conversations.len(), "conversations": conversations }),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    query: Option<String>,
    limit: Option<u32>,
}

pub(crate) async fn search_conversations(
    State(state): State<GatewayState>,
    Query(q): Query<SearchQuery>,
) -> ApiResult {
    let query = non_empty(q.query).ok_or_else(|| ApiError::bad_request("Search query is required"))?;
    let conversations = state
        .processor
        .messaging()
        .search_conversations(&query, q.limit.unwrap_or(20))
        .await?;
    Ok(Json(
        json!({ "count": conversations.len(), "conversations": conversations }),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SyncRequest {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    team_id: Option<String>,
}

pub(crate) async fn sync_conversation(
    State(state): State<GatewayState>,
    Json(req): Json<SyncRequest>,
) -> ApiResult {
    let conversation_id = non_empty(req.conversation_id)
        .ok_or_else(|| ApiError::bad_request("Conversation ID is required"))?;
    let team_id = non_empty(req.team_id)
        .or_else(|| state.processor.target().team_id.clone())
        .ok_or_else(|| ApiError::bad_request("Team ID is required"))?;
    let sent = state
        .processor
        .sync_conversation(&conversation_id, &team_id)
        .await
        .map_err(|e| {
            log::error!("failed to sync conversation {}: {}", conversation_id, e);
            ApiError::from(e)
        })?;
    Ok(Json(json!({
        "status": "success",
        "conversation_id": conversation_id,
        "teams_message": sent,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ForwardRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_email: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
}

pub(crate) async fn forward_to_intercom(
    State(state): State<GatewayState>,
    Json(req): Json<ForwardRequest>,
) -> ApiResult {
    let (Some(message), Some(user_email)) = (non_empty(req.message), non_empty(req.user_email))
    else {
        return Err(ApiError::bad_request("Message and user email are required"));
    };
    let response = state
        .processor
        .forward_chat_message(&message, &user_email, req.conversation_id.as_deref())
        .await
        .map_err(|e| {
            log::error!("failed to forward message to intercom: {}", e);
            ApiError::from(e)
        })?;
    Ok(Json(json!({
        "status": "success",
        "action": "message_forwarded",
        "intercom_response": response,
    })))
}
