//! `/api/config`: CRUD over the teams/channels mapping file.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use super::error::ApiError;
use super::server::GatewayState;
use crate::store::{ChannelConfig, TeamConfig, TeamsChannelsConfig};

pub(crate) async fn get_config(
    State(state): State<GatewayState>,
) -> Result<Json<TeamsChannelsConfig>, ApiError> {
    Ok(Json(state.store.load().await?))
}

pub(crate) async fn replace_config(
    State(state): State<GatewayState>,
    Json(doc): Json<TeamsChannelsConfig>,
) -> Result<Json<TeamsChannelsConfig>, ApiError> {
    state.store.save(&doc).await?;
    Ok(Json(doc))
}

pub(crate) async fn add_team(
    State(state): State<GatewayState>,
    Json(team): Json<TeamConfig>,
) -> Result<Json<TeamConfig>, ApiError> {
    Ok(Json(state.store.add_team(team).await?))
}

pub(crate) async fn update_team(
    State(state): State<GatewayState>,
    Path(team_id): Path<String>,
    Json(team): Json<TeamConfig>,
) -> Result<Json<TeamConfig>, ApiError> {
    Ok(Json(state.store.update_team(&team_id, team).await?))
}

pub(crate) async fn delete_team(
    State(state): State<GatewayState>,
    Path(team_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete_team(&team_id).await?;
    Ok(Json(json!({ "message": "Team deleted successfully" })))
}

pub(crate) async fn add_channel(
    State(state): State<GatewayState>,
    Path(team_id): Path<String>,
    Json(channel): Json<ChannelConfig>,
) -> Result<Json<ChannelConfig>, ApiError> {
    Ok(Json(state.store.add_channel(&team_id, channel).await?))
}

pub(crate) async fn delete_channel(
    State(state): State<GatewayState>,
    Path((team_id, channel_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete_channel(&team_id, &channel_id).await?;
    Ok(Json(json!({ "message": "Channel deleted successfully" })))
}
