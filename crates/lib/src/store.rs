//! Teams/channels mapping store: one flat JSON document on disk.
//!
//! The whole document is read and rewritten on every operation. There is no locking,
//! so concurrent writers race and the last one wins.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel_id: String,
    pub channel_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub team_id: String,
    pub team_name: String,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamsChannelsConfig {
    #[serde(default)]
    pub teams: Vec<TeamConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to load config: {0}")]
    Load(String),
    #[error("Failed to save config: {0}")]
    Save(String),
    #[error("Team already exists")]
    TeamExists,
    #[error("Team not found")]
    TeamNotFound,
    #[error("Channel already exists")]
    ChannelExists,
    #[error("Channel not found")]
    ChannelNotFound,
}

/// File-backed store for `TeamsChannelsConfig`.
#[derive(Debug, Clone)]
pub struct TeamsChannelsStore {
    path: PathBuf,
}

impl TeamsChannelsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; a missing file is an empty document.
    pub async fn load(&self) -> Result<TeamsChannelsConfig, StoreError> {
        let s = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TeamsChannelsConfig::default())
            }
            Err(e) => return Err(StoreError::Load(e.to_string())),
        };
        serde_json::from_str(&s).map_err(|e| StoreError::Load(e.to_string()))
    }

    /// Replace the document on disk, creating the parent directory if needed.
    pub async fn save(&self, config: &TeamsChannelsConfig) -> Result<(), StoreError> {
        let json =
            serde_json::to_string_pretty(config).map_err(|e| StoreError::Save(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Save(e.to_string()))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::Save(e.to_string()))
    }

    pub async fn add_team(&self, team: TeamConfig) -> Result<TeamConfig, StoreError> {
        let mut config = self.load().await?;
        if config.teams.iter().any(|t| t.team_id == team.team_id) {
            return Err(StoreError::TeamExists);
        }
        config.teams.push(team.clone());
        self.save(&config).await?;
        Ok(team)
    }

    /// Replace the team stored under `team_id` (the replacement may carry a new id).
    pub async fn update_team(&self, team_id: &str, team: TeamConfig) -> Result<TeamConfig, StoreError> {
        let mut config = self.load().await?;
        let slot = config
            .teams
            .iter_mut()
            .find(|t| t.team_id == team_id)
            .ok_or(StoreError::TeamNotFound)?;
        *slot = team.clone();
        self.save(&config).await?;
        Ok(team)
    }

    pub async fn delete_team(&self, team_id: &str) -> Result<(), StoreError> {
        let mut config = self.load().await?;
        let i = config
            .teams
            .iter()
            .position(|t| t.team_id == team_id)
            .ok_or(StoreError::TeamNotFound)?;
        config.teams.remove(i);
        self.save(&config).await
    }

    pub async fn add_channel(
        &self,
        team_id: &str,
        channel: ChannelConfig,
    ) -> Result<ChannelConfig, StoreError> {
        let mut config = self.load().await?;
        let team = config
            .teams
            .iter_mut()
            .find(|t| t.team_id == team_id)
            .ok_or(StoreError::TeamNotFound)?;
        if team.channels.iter().any(|c| c.channel_id == channel.channel_id) {
            return Err(StoreError::ChannelExists);
        }
        team.channels.push(channel.clone());
        self.save(&config).await?;
        Ok(channel)
    }

    pub async fn delete_channel(&self, team_id: &str, channel_id: &str) -> Result<(), StoreError> {
        let mut config = self.load().await?;
        let team = config
            .teams
            .iter_mut()
            .find(|t| t.team_id == team_id)
            .ok_or(StoreError::TeamNotFound)?;
        let i = team
            .channels
            .iter()
            .position(|c| c.channel_id == channel_id)
            .ok_or(StoreError::ChannelNotFound)?;
        team.channels.remove(i);
        self.save(&config).await
    }
}
